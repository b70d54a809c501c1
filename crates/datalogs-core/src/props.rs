//! Opt-in property logging.
//!
//! A type lists the fields it wants logged by implementing [`LoggedProps`];
//! [`Logger::log_props`](crate::Logger::log_props) saves exactly those fields,
//! in declaration order.
//!
//! ```
//! use datalogs_core::{LoggedProps, Props};
//!
//! struct PowerRabi {
//!     qubit: u32,
//!     amplitude: f64,
//!     scratch: Vec<u8>,
//! }
//!
//! impl LoggedProps for PowerRabi {
//!     fn logged_props(&self) -> Props {
//!         Props::new()
//!             .prop("qubit", self.qubit)
//!             .prop("amplitude", self.amplitude)
//!     }
//! }
//! ```

use crate::models::LogValue;

/// Types that declare which of their properties are logged.
pub trait LoggedProps {
    fn logged_props(&self) -> Props;
}

/// Ordered property name/value pairs.
#[derive(Debug, Clone, Default)]
pub struct Props {
    entries: Vec<(String, LogValue)>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property. Declaring a name again replaces its value in place.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<LogValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Add every property of `other`, e.g. those declared by an embedded type.
    pub fn extend(self, other: Props) -> Self {
        other
            .entries
            .into_iter()
            .fold(self, |props, (name, value)| props.prop(name, value))
    }

    /// Stop logging `name`.
    pub fn remove(mut self, name: &str) -> Self {
        self.entries.retain(|(n, _)| n != name);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Props> for LogValue {
    fn from(props: Props) -> Self {
        LogValue::map(props.entries)
    }
}
