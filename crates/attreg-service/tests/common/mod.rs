//! Shared fixtures for service integration tests.

#![allow(dead_code)]

use attreg_core::{AttendeeId, Status, Subject, Timestamp};
use attreg_ledger::NewTransaction;
use attreg_service::{
    AttendeeRepository, InMemoryHandles, NewAttendee, Permission, RegistrationService,
    ServiceConfig, TransitionRequest,
};
use attreg_state::AuthClaims;

pub const TICKET: i64 = 25500;

pub const CONFIG: &str = r#"
dues:
  currency: EUR
  vat_rate_percent: 19.0
  due_in_days: 0
packages:
  attendance:
    description: Entrance Fee (Convention Ticket)
    price: 25500
    default: true
  sponsor:
    description: Sponsor Upgrade
    price: 6500
downstream:
  payment_timeout_ms: 500
  mail_timeout_ms: 500
"#;

pub fn subject(s: &str) -> Subject {
    Subject::new(s).unwrap()
}

pub fn admin() -> AuthClaims {
    AuthClaims::admin(subject("admin"))
}

pub fn owner() -> AuthClaims {
    AuthClaims::user(subject("owner"))
}

pub fn staff_owner() -> AuthClaims {
    AuthClaims::staff(subject("owner"))
}

pub fn other() -> AuthClaims {
    AuthClaims::user(subject("someone-else"))
}

pub fn desk() -> AuthClaims {
    AuthClaims::user(subject("desk"))
}

pub struct Harness {
    pub service: RegistrationService,
    pub handles: InMemoryHandles,
    pub id: AttendeeId,
}

impl Harness {
    /// Service with one attendee registered by `owner()` and a regdesk
    /// holder registered by `desk()`.
    pub async fn new() -> Self {
        let config = ServiceConfig::from_yaml_str(CONFIG).unwrap();
        let (service, handles) = RegistrationService::in_memory(config).unwrap();
        let id = service
            .register(
                Some(&owner()),
                NewAttendee::new("Snep", "snep@example.com", ["attendance"]),
            )
            .await
            .unwrap()
            .id;
        let desk_id = service
            .register(
                Some(&desk()),
                NewAttendee::new("Desk", "desk@example.com", ["attendance"]),
            )
            .await
            .unwrap()
            .id;
        service
            .grant_permission(Some(&admin()), desk_id, Permission::Regdesk)
            .await
            .unwrap();
        handles.mail.clear();
        Self {
            service,
            handles,
            id,
        }
    }

    /// Put the attendee into `status` without going through the policy.
    pub async fn set_status(&self, status: Status) {
        self.handles
            .repository
            .append_status_change(self.id, status, "setup", Timestamp::now())
            .await
            .unwrap();
    }

    /// Seed a due posting that is not counted as recorded.
    pub fn seed_due(&self, amount: i64) {
        self.handles
            .payments
            .inject(NewTransaction::due(self.id, amount, "seeded due"));
    }

    /// Seed a payment that is not counted as recorded.
    pub fn seed_payment(&self, amount: i64) {
        self.handles
            .payments
            .inject(NewTransaction::payment(self.id, amount, "seeded payment"));
    }

    pub fn request(&self, claims: &AuthClaims, status: &str) -> TransitionRequest {
        TransitionRequest::new(self.id, Some(claims.clone()), status, "test")
    }

    pub async fn history_len(&self) -> usize {
        self.service
            .status_history(Some(&admin()), self.id)
            .await
            .unwrap()
            .len()
    }

    pub async fn status(&self) -> Status {
        self.service
            .current_status(Some(&admin()), self.id)
            .await
            .unwrap()
    }
}
