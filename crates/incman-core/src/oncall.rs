// Weekday-based on-call rotation.

use chrono::{Datelike, Local, Weekday};
use thiserror::Error;

pub const DEFAULT_ROTATION: [&str; 5] = ["alexa", "alice", "octavia", "aria", "shellfish"];

#[derive(Debug, Error, PartialEq)]
pub enum RotationError {
    #[error("rotation must have at least one member")]
    Empty,
    #[error("rotation member {0} is blank")]
    BlankMember(usize),
}

/// Ordered list of responders. Monday maps to the first member, Tuesday to the
/// second, wrapping around when the week is longer than the rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    members: Vec<String>,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            members: DEFAULT_ROTATION.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Rotation {
    pub fn new(members: Vec<String>) -> Result<Self, RotationError> {
        if members.is_empty() {
            return Err(RotationError::Empty);
        }
        if let Some(pos) = members.iter().position(|m| m.trim().is_empty()) {
            return Err(RotationError::BlankMember(pos));
        }
        Ok(Self { members })
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn on_call_for(&self, day: Weekday) -> &str {
        let idx = day.num_days_from_monday() as usize % self.members.len();
        &self.members[idx]
    }

    /// Responder for today's local calendar day.
    pub fn on_call_now(&self) -> &str {
        self.on_call_for(Local::now().weekday())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rotation_covers_the_week() {
        let r = Rotation::default();
        assert_eq!(r.on_call_for(Weekday::Mon), "alexa");
        assert_eq!(r.on_call_for(Weekday::Tue), "alice");
        assert_eq!(r.on_call_for(Weekday::Wed), "octavia");
        assert_eq!(r.on_call_for(Weekday::Thu), "aria");
        assert_eq!(r.on_call_for(Weekday::Fri), "shellfish");
        // Weekend wraps back to the start of the list.
        assert_eq!(r.on_call_for(Weekday::Sat), "alexa");
        assert_eq!(r.on_call_for(Weekday::Sun), "alice");
    }

    #[test]
    fn single_member_rotation_is_always_on_call() {
        let r = Rotation::new(vec!["solo".into()]).unwrap();
        for day in [Weekday::Mon, Weekday::Thu, Weekday::Sun] {
            assert_eq!(r.on_call_for(day), "solo");
        }
    }

    #[test]
    fn on_call_now_is_a_member() {
        let r = Rotation::default();
        assert!(r.members().iter().any(|m| m == r.on_call_now()));
    }

    #[test]
    fn empty_or_blank_rotation_is_rejected() {
        assert_eq!(Rotation::new(vec![]), Err(RotationError::Empty));
        assert_eq!(
            Rotation::new(vec!["kim".into(), "  ".into()]),
            Err(RotationError::BlankMember(1))
        );
    }
}
