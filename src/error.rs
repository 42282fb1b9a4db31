//! Helpers for batch operations that skip failing items instead of aborting.

/// Converts a `Result` into an `Option`, logging the error at `error` level.
///
/// Used where one failing process must not stop the sampling of the others.
pub trait ResultOkLogExt<T, E> {
    fn ok_log(self) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{err}");
                None
            }
        }
    }
}
