mod from_google;
mod to_google;

use crate::error::GoogleError;

/// Convert from Google API types to rotamirror types
pub trait FromGoogle<T> {
    fn from_google(value: T) -> Result<Self, GoogleError>
    where
        Self: Sized;
}

/// Convert to Google API types from rotamirror types
pub trait ToGoogle<T> {
    fn to_google(&self) -> T;
}
