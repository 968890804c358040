//! Live bot properties with a change hook.
//!
//! Every write goes through a setter that stores the value and then tells the
//! observer, so a dashboard or log sees each update as it happens.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value passed to observers.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Number(u64),
    Time(DateTime<Local>),
    Unset,
}

impl From<Option<u64>> for PropValue {
    fn from(value: Option<u64>) -> Self {
        value.map(PropValue::Number).unwrap_or(PropValue::Unset)
    }
}

impl From<Option<DateTime<Local>>> for PropValue {
    fn from(value: Option<DateTime<Local>>) -> Self {
        value.map(PropValue::Time).unwrap_or(PropValue::Unset)
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Number(n) => write!(f, "{}", n),
            PropValue::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            PropValue::Unset => write!(f, "-"),
        }
    }
}

/// Notified after every property write.
pub trait PropsObserver: Send {
    fn on_change(&self, name: &str, value: &PropValue);
}

impl<F> PropsObserver for F
where
    F: Fn(&str, &PropValue) + Send,
{
    fn on_change(&self, name: &str, value: &PropValue) {
        self(name, value)
    }
}

/// Plain copy of the tracked values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedProps {
    pub current_stage: Option<u64>,
    pub advance_start: Option<u64>,
    pub ads_collected: u64,
    pub last_prestige: Option<DateTime<Local>>,
    pub next_raid_reset: Option<DateTime<Local>>,
}

#[derive(Default)]
pub struct Props {
    values: TrackedProps,
    observer: Option<Box<dyn PropsObserver>>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: impl PropsObserver + 'static) -> Self {
        Self {
            values: TrackedProps::default(),
            observer: Some(Box::new(observer)),
        }
    }

    pub fn set_observer(&mut self, observer: impl PropsObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    fn notify(&self, name: &str, value: PropValue) {
        log::debug!("prop {} = {}", name, value);
        if let Some(observer) = &self.observer {
            observer.on_change(name, &value);
        }
    }

    pub fn current_stage(&self) -> Option<u64> {
        self.values.current_stage
    }

    pub fn set_current_stage(&mut self, stage: Option<u64>) {
        self.values.current_stage = stage;
        self.notify("current_stage", stage.into());
    }

    pub fn advance_start(&self) -> Option<u64> {
        self.values.advance_start
    }

    pub fn set_advance_start(&mut self, stage: Option<u64>) {
        self.values.advance_start = stage;
        self.notify("advance_start", stage.into());
    }

    pub fn ads_collected(&self) -> u64 {
        self.values.ads_collected
    }

    /// Counts one more collected ad and returns the new total.
    pub fn increment_ads(&mut self) -> u64 {
        self.values.ads_collected += 1;
        let total = self.values.ads_collected;
        self.notify("ads_collected", PropValue::Number(total));
        total
    }

    pub fn last_prestige(&self) -> Option<DateTime<Local>> {
        self.values.last_prestige
    }

    pub fn set_last_prestige(&mut self, at: DateTime<Local>) {
        self.values.last_prestige = Some(at);
        self.notify("last_prestige", PropValue::Time(at));
    }

    pub fn next_raid_reset(&self) -> Option<DateTime<Local>> {
        self.values.next_raid_reset
    }

    pub fn set_next_raid_reset(&mut self, at: Option<DateTime<Local>>) {
        self.values.next_raid_reset = at;
        self.notify("next_raid_reset", at.into());
    }

    /// Copy of the current values without the observer.
    pub fn detached(&self) -> TrackedProps {
        self.values.clone()
    }
}
