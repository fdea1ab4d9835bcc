//! `JobValidation`: structured, per-facet validation report for job create.

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};
use crate::job::{validate_hosts, JobCreateRequest};

/// One facet's outcome: whether it passed, and the messages if not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facet {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl Facet {
    fn pass() -> Self {
        Facet {
            ok: true,
            errors: Vec::new(),
        }
    }

    fn fail(errors: Vec<String>) -> Self {
        Facet { ok: false, errors }
    }
}

/// Structured multi-field validation outcome for `POST /JobService/Jobs`.
/// Returned to the caller verbatim on failure (spec §4.3/§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub hosts: Facet,
    /// The action tag is structurally tied to the payload shape (see
    /// `ActionPayload`), so this facet only ever fails if the payload facet
    /// does; it is kept distinct because the external contract (spec §4.3)
    /// names it as its own facet.
    pub action: Facet,
    pub payload: Facet,
    pub schedule: Facet,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.hosts.ok && self.action.ok && self.payload.ok && self.schedule.ok
    }
}

/// Validates a job creation request against every facet in spec §4.3,
/// returning `Ok(())` if every facet passes or `Err(FleetError::Validation)`
/// with the full report otherwise.
pub fn validate_job(request: &JobCreateRequest) -> FleetResult<()> {
    let hosts = match validate_hosts(&request.hosts) {
        Ok(()) => Facet::pass(),
        Err(FleetError::BadRequest(msg)) => Facet::fail(vec![msg]),
        Err(other) => Facet::fail(vec![other.to_string()]),
    };

    let payload = if request.payload.is_empty() {
        Facet::fail(vec!["payload must not be empty".to_string()])
    } else {
        match request.payload.validate_identity() {
            Ok(()) => Facet::pass(),
            Err(FleetError::BadRequest(msg)) => Facet::fail(vec![msg]),
            Err(other) => Facet::fail(vec![other.to_string()]),
        }
    };

    // The action tag cannot disagree with the payload shape by construction;
    // it only fails alongside an empty/malformed payload.
    let action = if payload.ok {
        Facet::pass()
    } else {
        Facet::fail(vec![format!(
            "action '{}' payload is invalid",
            request.payload.action()
        )])
    };

    let schedule = match request.schedule.validate() {
        Ok(()) => Facet::pass(),
        Err(FleetError::BadRequest(msg)) => Facet::fail(vec![msg]),
        Err(other) => Facet::fail(vec![other.to_string()]),
    };

    let report = ValidationReport {
        hosts,
        action,
        payload,
        schedule,
    };

    if report.is_ok() {
        Ok(())
    } else {
        Err(FleetError::Validation(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ManagerEntry;
    use crate::schedule::{Schedule, TimeOfDay};

    #[test]
    fn rejects_duplicate_hosts() {
        let request = JobCreateRequest {
            name: None,
            hosts: vec!["h1".into(), "h2".into(), "h1".into()],
            payload: crate::job::ActionPayload::PatchProfile(vec![ManagerEntry {
                manager_id: "bmc".into(),
                body: Default::default(),
            }]),
            schedule: Schedule::Once {
                time_of_day: TimeOfDay::parse("08:00:00").unwrap(),
            },
        };
        let err = validate_job(&request).unwrap_err();
        match err {
            FleetError::Validation(report) => {
                assert!(!report.hosts.ok);
                assert!(report.hosts.errors[0].contains("duplicate"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::job::validate_hosts;
    use proptest::prelude::*;

    proptest! {
        /// For any list of non-empty host ids, `validate_hosts` accepts it
        /// iff it is actually duplicate-free (spec §8's "for all jobs J,
        /// J.hosts contains no duplicates" invariant, restated as the
        /// validator's acceptance condition).
        #[test]
        fn validate_hosts_accepts_iff_duplicate_free(
            hosts in prop::collection::vec("[a-z]{1,4}", 1..8),
        ) {
            let has_duplicates = {
                let mut seen = std::collections::HashSet::new();
                hosts.iter().any(|h| !seen.insert(h.clone()))
            };
            prop_assert_eq!(validate_hosts(&hosts).is_ok(), !has_duplicates);
        }
    }
}
