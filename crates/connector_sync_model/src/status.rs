use serde::{
    de::Deserializer,
    Deserialize,
    Serialize,
    Serializer,
};

/// Declares an enum whose wire representation is a lowercase-snake string,
/// with an explicit `Unset` variant standing in for an absent/`null` field.
/// Every status enum in the control plane needs this (§3, §9's design note:
/// "every status enum includes an `unset` case to model absent fields on
/// read"), so the shape is factored out once rather than hand-rolled per
/// enum.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
        pub enum $name {
            $(#[display($wire)] $variant,)+
            #[display("unset")]
            Unset,
        }

        impl $name {
            pub fn as_str(&self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some($wire),)+
                    Self::Unset => None,
                }
            }

            pub fn from_opt_str(value: Option<&str>) -> Self {
                match value {
                    $(Some($wire) => Self::$variant,)+
                    _ => Self::Unset,
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.as_str() {
                    Some(s) => serializer.serialize_str(s),
                    None => serializer.serialize_none(),
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = Option::<String>::deserialize(deserializer)?;
                Ok(Self::from_opt_str(value.as_deref()))
            }
        }
    };
}

wire_enum! {
    /// Connector lifecycle status (§3).
    Status {
        Created => "created",
        NeedsConfiguration => "needs_configuration",
        Configured => "configured",
        Connected => "connected",
        Error => "error",
    }
}

wire_enum! {
    /// SyncJob lifecycle status (§3).
    JobStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Canceling => "canceling",
        Canceled => "canceled",
        Suspended => "suspended",
        Completed => "completed",
        Error => "error",
    }
}

impl JobStatus {
    /// A job is terminal iff its status is one of these three (§3, §8).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error | JobStatus::Canceled)
    }
}

wire_enum! {
    /// How a SyncJob was triggered (§3).
    JobTriggerMethod {
        OnDemand => "on_demand",
        Scheduled => "scheduled",
    }
}

wire_enum! {
    /// Validation state attached to a draft/active [`crate::Filter`] (§3).
    FilteringValidationState {
        Edited => "edited",
        Valid => "valid",
        Invalid => "invalid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_on_absent_or_unknown() {
        assert_eq!(Status::from_opt_str(None), Status::Unset);
        assert_eq!(Status::from_opt_str(Some("bogus")), Status::Unset);
        assert_eq!(Status::from_opt_str(Some("connected")), Status::Connected);
    }

    #[test]
    fn deserializes_null_to_unset() {
        let status: Status = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert_eq!(status, Status::Unset);
    }

    #[test]
    fn display_matches_wire_string() {
        assert_eq!(Status::Connected.to_string(), "connected");
        assert_eq!(Status::Unset.to_string(), "unset");
    }

    #[test]
    fn job_terminal_iff_completed_error_canceled() {
        for status in [JobStatus::Completed, JobStatus::Error, JobStatus::Canceled] {
            assert!(status.is_terminal());
        }
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Canceling,
            JobStatus::Suspended,
            JobStatus::Unset,
        ] {
            assert!(!status.is_terminal());
        }
    }
}
