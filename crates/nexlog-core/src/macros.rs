//! Emission macros that record the enclosing function name
//!
//! ```ignore
//! log_info!(logger, "user created", { "user_id": id, "plan": plan });
//! log_error!(logger, "payment failed");
//! ```

/// Name of the enclosing function, without its module path
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::short_function_name(type_name_of(__f))
    }};
}

/// [`CallSite`](crate::CallSite) of the macro invocation
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(
            $crate::short_module_name(::std::module_path!()),
            $crate::function_name!(),
            ::std::line!(),
        )
    };
}

/// Emit at an explicit level, with optional `{ "key": value, ... }` extras
#[macro_export]
macro_rules! log_event {
    ($logger:expr, $level:expr, $message:expr $(,)?) => {
        $logger.log_at($crate::call_site!(), $level, $message, $crate::Extras::new())
    };
    ($logger:expr, $level:expr, $message:expr, { $($key:literal : $value:expr),* $(,)? } $(,)?) => {{
        #[allow(unused_mut)]
        let mut extras = $crate::Extras::new();
        $( extras.insert($key, $value); )*
        $logger.log_at($crate::call_site!(), $level, $message, extras)
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::Level::Debug, $($rest)+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::Level::Info, $($rest)+)
    };
}

#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::Level::Warning, $($rest)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::Level::Error, $($rest)+)
    };
}

#[macro_export]
macro_rules! log_critical {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::Level::Critical, $($rest)+)
    };
}
