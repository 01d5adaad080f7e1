//! Shared provider traits for dependency injection.
//!
//! Ambient inputs (currently just the calendar date) sit behind traits so
//! that the output writer can be tested with fixed values.

use chrono::{Local, NaiveDate};

/// Trait for providing the current date.
///
/// # Example
///
/// ```
/// use intention::providers::{DateProvider, SystemDateProvider};
///
/// let today = SystemDateProvider.today();
/// assert!(today.to_string().len() == 10);
/// ```
pub trait DateProvider: Send + Sync {
    /// Returns today's date in the local time zone.
    fn today(&self) -> NaiveDate;
}

/// Default date provider using the system clock.
pub struct SystemDateProvider;

impl DateProvider for SystemDateProvider {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Date provider that always returns the same day.
pub struct FixedDateProvider(pub NaiveDate);

impl DateProvider for FixedDateProvider {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
