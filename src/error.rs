//! Macros for terminating the command line program on errors.
//!
//! With the `for-testing` feature the macros panic instead of exiting,
//! so that failures can be caught by tests.

/// Prints the formatted message to standard error and exits with code 1.
#[cfg(not(feature = "for-testing"))]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        eprintln!($($print_arg)*);
        quit::with_code(1);
    }};
}

#[cfg(feature = "for-testing")]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        panic!($($print_arg)*);
    }};
}

/// Unwraps the `Result`, or exits with the formatted message. The error is
/// passed as the last formatting argument.
#[macro_export]
macro_rules! exit_on_error {
    ($result:expr, $($print_arg:tt)*) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $crate::exit_with_error!($($print_arg)*, err)
            }
        }
    };
}

/// Exits with the formatted message unless the condition holds.
#[macro_export]
macro_rules! exit_on_false {
    ($logic:expr, $($print_arg:tt)*) => {
        if !$logic {
            $crate::exit_with_error!($($print_arg)*)
        }
    };
}

/// Unwraps the `Option`, or exits with the formatted message.
#[macro_export]
macro_rules! exit_on_none {
    ($option:expr, $($print_arg:tt)*) => {
        $option.unwrap_or_else(|| $crate::exit_with_error!($($print_arg)*))
    };
}
