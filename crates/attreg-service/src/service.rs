//! # Registration Service
//!
//! Facade over the executor and repository. Every operation takes the
//! caller's auth claims (`None` for anonymous) and enforces who may do
//! what before touching any data.
//!
//! | Operation          | Allowed roles                          |
//! |--------------------|----------------------------------------|
//! | `register`         | any authenticated caller               |
//! | `attendee`         | admin, self, staff-self                |
//! | `update_packages`  | admin, self, staff-self                |
//! | `grant_permission` | admin                                  |
//! | `current_status`   | admin, self, staff-self, regdesk       |
//! | `status_history`   | admin                                  |
//! | `change_status`    | per the transition table               |

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use attreg_core::{AttendeeId, Status, Timestamp};
use attreg_ledger::{InMemoryMailService, InMemoryPaymentService};
use attreg_state::{
    financial_state, ActorRole, AuthClaims, DueAdjustment, StatusChange, COMMENT_DUES_ADJUSTMENT,
};

use crate::attendee::{AdminInfo, Attendee, NewAttendee, Permission};
use crate::config::{ConfigError, ServiceConfig};
use crate::error::ServiceError;
use crate::executor::{
    resolve_role, Collaborators, ExecutorSettings, TransitionExecutor, TransitionOutcome,
    TransitionRequest,
};
use crate::pricing::PackagePricing;
use crate::repository::InMemoryRepository;

/// Comment on the history row written at registration.
pub const REGISTRATION_COMMENT: &str = "registration";

const OWNER_OR_ADMIN: &[ActorRole] = &[ActorRole::Admin, ActorRole::SelfOwner, ActorRole::StaffSelf];
const STATUS_READERS: &[ActorRole] = &[
    ActorRole::Admin,
    ActorRole::SelfOwner,
    ActorRole::StaffSelf,
    ActorRole::Regdesk,
];

/// Parse an attendee id from a path segment.
pub fn parse_attendee_id(raw: &str) -> Result<AttendeeId, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::validation("attendee.id.invalid", "invalid attendee id"))
}

/// Handles to the in-memory collaborators behind a service built with
/// [`RegistrationService::in_memory`].
#[derive(Debug, Clone)]
pub struct InMemoryHandles {
    /// Attendee storage.
    pub repository: InMemoryRepository,
    /// Payment simulator.
    pub payments: Arc<InMemoryPaymentService>,
    /// Mail simulator.
    pub mail: Arc<InMemoryMailService>,
}

/// The attendee registration service.
#[derive(Debug, Clone)]
pub struct RegistrationService {
    config: Arc<ServiceConfig>,
    collaborators: Collaborators,
    executor: TransitionExecutor,
}

impl RegistrationService {
    /// Service over the given collaborators. Fails if `config` is invalid.
    pub fn new(config: ServiceConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let settings = ExecutorSettings::from_config(&config)?;
        let executor = TransitionExecutor::new(collaborators.clone(), settings);
        Ok(Self {
            config: Arc::new(config),
            collaborators,
            executor,
        })
    }

    /// Service over fresh in-memory collaborators, priced and dated from
    /// `config`.
    pub fn in_memory(config: ServiceConfig) -> Result<(Self, InMemoryHandles), ConfigError> {
        let handles = InMemoryHandles {
            repository: InMemoryRepository::new(),
            payments: Arc::new(InMemoryPaymentService::new()),
            mail: Arc::new(InMemoryMailService::new()),
        };
        let collaborators = Collaborators {
            repository: Arc::new(handles.repository.clone()),
            payments: handles.payments.clone(),
            mail: handles.mail.clone(),
            pricing: Arc::new(PackagePricing::from_config(&config)),
            due_dates: config.dues.due_date_policy(),
        };
        let service = Self::new(config, collaborators)?;
        Ok((service, handles))
    }

    /// The active configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The transition executor.
    pub fn executor(&self) -> &TransitionExecutor {
        &self.executor
    }

    // ── Registration data ───────────────────────────────────────────────

    /// Register a new attendee owned by the caller.
    ///
    /// With no packages selected, the configured default packages apply.
    pub async fn register(
        &self,
        claims: Option<&AuthClaims>,
        mut data: NewAttendee,
    ) -> Result<Attendee, ServiceError> {
        let claims = claims.ok_or(ServiceError::Unauthenticated)?;
        if data.packages.is_empty() {
            data.packages = self.config.default_packages().into_iter().collect();
        }
        self.validate_registration(&data)?;

        let repository = &self.collaborators.repository;
        if let Some(existing) = repository
            .find_duplicate(&data.nickname, &data.email)
            .await?
        {
            return Err(ServiceError::Duplicate { existing });
        }

        let now = Timestamp::now();
        let attendee = repository
            .add_attendee(data, claims.subject.clone(), now)
            .await?;
        self.executor
            .history()
            .append(attendee.id, Status::New, REGISTRATION_COMMENT, now)
            .await?;
        info!(attendee_id = %attendee.id, subject = %claims.subject, "attendee registered");
        Ok(attendee)
    }

    /// Load an attendee's registration.
    pub async fn attendee(
        &self,
        claims: Option<&AuthClaims>,
        id: AttendeeId,
    ) -> Result<Attendee, ServiceError> {
        let (attendee, _) = self
            .authorize(claims, id, OWNER_OR_ADMIN, ServiceError::forbidden_data)
            .await?;
        Ok(attendee)
    }

    /// Replace the package selection.
    ///
    /// The new selection is stored first. When the current status carries
    /// dues, the difference between what the new selection costs and what
    /// has been charged is then posted; if that posting fails the previous
    /// selection is restored. A failed write posts nothing.
    pub async fn update_packages(
        &self,
        claims: Option<&AuthClaims>,
        id: AttendeeId,
        packages: BTreeSet<String>,
    ) -> Result<Attendee, ServiceError> {
        self.authorize(claims, id, OWNER_OR_ADMIN, ServiceError::forbidden_operation)
            .await?;
        self.validate_packages(&packages)?;

        let _guard = self.executor.locks().lock(id).await;
        let repository = &self.collaborators.repository;
        let previous = repository.get_attendee(id).await?;
        let mut attendee = previous.clone();
        attendee.packages = packages;
        repository.update_attendee(&attendee).await?;

        match self.reconcile_dues(&attendee).await {
            Ok(status) => {
                attendee.status = status;
                Ok(attendee)
            }
            Err(e) => {
                if let Err(restore) = repository.update_attendee(&previous).await {
                    error!(
                        attendee_id = %id,
                        error = %restore,
                        "failed to restore packages after dues posting failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Post the dues difference for `attendee`'s selection when its status
    /// carries dues. Returns the current status.
    async fn reconcile_dues(&self, attendee: &Attendee) -> Result<Status, ServiceError> {
        let id = attendee.id;
        let status = self.executor.history().latest(id).await?;
        if !status.carries_dues() {
            return Ok(status);
        }
        let transactions = self.executor.ledger_for(id).await?;
        let financial = financial_state(&transactions);
        let delta = self
            .collaborators
            .pricing
            .expected_dues(attendee)
            .saturating_sub(financial.dues_posted);
        if delta != 0 {
            let key = format!("attendee-{id}/ledger-{}/packages", transactions.len());
            let adjustment = DueAdjustment {
                amount: delta,
                comment: COMMENT_DUES_ADJUSTMENT.to_string(),
            };
            self.executor.post_due(id, adjustment, key).await?;
            info!(attendee_id = %id, amount = delta, "dues reconciled after package change");
        }
        Ok(status)
    }

    /// Grant a permission on an attendee. Admin only.
    pub async fn grant_permission(
        &self,
        claims: Option<&AuthClaims>,
        id: AttendeeId,
        permission: Permission,
    ) -> Result<AdminInfo, ServiceError> {
        self.require_admin(claims, id, ServiceError::forbidden_operation)?;
        let repository = &self.collaborators.repository;
        let mut info = repository.get_admin_info(id).await?;
        info.permissions.insert(permission);
        repository.write_admin_info(&info).await?;
        info!(attendee_id = %id, permission = %permission, "permission granted");
        Ok(info)
    }

    /// The caller's role relative to an attendee.
    pub async fn resolve_role(
        &self,
        claims: Option<&AuthClaims>,
        id: AttendeeId,
    ) -> Result<ActorRole, ServiceError> {
        let attendee = self.collaborators.repository.get_attendee(id).await?;
        resolve_role(self.collaborators.repository.as_ref(), claims, &attendee).await
    }

    // ── Status ──────────────────────────────────────────────────────────

    /// Current status, from the latest history row.
    pub async fn current_status(
        &self,
        claims: Option<&AuthClaims>,
        id: AttendeeId,
    ) -> Result<Status, ServiceError> {
        self.authorize(claims, id, STATUS_READERS, ServiceError::forbidden_data)
            .await?;
        Ok(self.executor.history().latest(id).await?)
    }

    /// Full status history, oldest first. Admin only.
    pub async fn status_history(
        &self,
        claims: Option<&AuthClaims>,
        id: AttendeeId,
    ) -> Result<Vec<StatusChange>, ServiceError> {
        self.require_admin(claims, id, ServiceError::forbidden_data)?;
        Ok(self.executor.history().list(id).await?)
    }

    /// Request a status change.
    pub async fn change_status(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, ServiceError> {
        self.executor.execute(request).await
    }

    // ── Access checks ───────────────────────────────────────────────────

    async fn authorize(
        &self,
        claims: Option<&AuthClaims>,
        id: AttendeeId,
        allowed: &[ActorRole],
        denial: fn() -> ServiceError,
    ) -> Result<(Attendee, ActorRole), ServiceError> {
        let Some(caller) = claims else {
            return Err(ServiceError::Unauthenticated);
        };
        let repository = &self.collaborators.repository;
        let attendee = repository.get_attendee(id).await?;
        let role = resolve_role(repository.as_ref(), claims, &attendee).await?;
        if !allowed.contains(&role) {
            warn!(
                security = true,
                attendee_id = %id,
                subject = %caller.subject,
                role = %role,
                "unauthorized access attempted"
            );
            return Err(denial());
        }
        Ok((attendee, role))
    }

    fn require_admin(
        &self,
        claims: Option<&AuthClaims>,
        id: AttendeeId,
        denial: fn() -> ServiceError,
    ) -> Result<(), ServiceError> {
        match claims {
            None => Err(ServiceError::Unauthenticated),
            Some(c) if c.is_admin => Ok(()),
            Some(c) => {
                warn!(
                    security = true,
                    attendee_id = %id,
                    subject = %c.subject,
                    "non-admin attempted admin operation"
                );
                Err(denial())
            }
        }
    }

    // ── Validation ──────────────────────────────────────────────────────

    fn validate_registration(&self, data: &NewAttendee) -> Result<(), ServiceError> {
        if data.nickname.trim().is_empty() {
            return Err(ServiceError::validation(
                "attendee.data.invalid",
                "nickname: must not be blank",
            ));
        }
        let email_ok = data
            .email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !email_ok {
            return Err(ServiceError::validation(
                "attendee.data.invalid",
                "email: must be a valid email address",
            ));
        }
        self.validate_packages(&data.packages)
    }

    fn validate_packages(&self, packages: &BTreeSet<String>) -> Result<(), ServiceError> {
        let unknown: Vec<&str> = packages
            .iter()
            .map(String::as_str)
            .filter(|p| !self.collaborators.pricing.knows_package(p))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::validation(
                "attendee.data.invalid",
                format!("packages: unknown package(s) {}", unknown.join(", ")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attreg_core::Subject;

    fn config() -> ServiceConfig {
        ServiceConfig::from_yaml_str(
            r#"
packages:
  attendance:
    description: Entrance Fee
    price: 25500
    default: true
  sponsor:
    description: Sponsor Upgrade
    price: 6500
"#,
        )
        .unwrap()
    }

    fn user(s: &str) -> AuthClaims {
        AuthClaims::user(Subject::new(s).unwrap())
    }

    fn admin() -> AuthClaims {
        AuthClaims::admin(Subject::new("admin").unwrap())
    }

    #[test]
    fn test_parse_attendee_id() {
        assert_eq!(parse_attendee_id("42").unwrap().get(), 42);
        for raw in ["", "0", "042", "-1", "x"] {
            let err = parse_attendee_id(raw).unwrap_err();
            assert_eq!(err.status_and_code(), (400, "attendee.id.invalid"), "{raw:?}");
        }
    }

    #[tokio::test]
    async fn test_register_applies_defaults_and_records_history() {
        let (service, _) = RegistrationService::in_memory(config()).unwrap();
        let attendee = service
            .register(
                Some(&user("u1")),
                NewAttendee::new("Snep", "snep@example.com", Vec::<String>::new()),
            )
            .await
            .unwrap();
        assert!(attendee.packages.contains("attendance"));

        let history = service
            .status_history(Some(&admin()), attendee.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, Status::New);
        assert_eq!(history[0].comment, REGISTRATION_COMMENT);
    }

    #[tokio::test]
    async fn test_register_rejections() {
        let (service, _) = RegistrationService::in_memory(config()).unwrap();
        let err = service
            .register(None, NewAttendee::new("Snep", "snep@example.com", ["attendance"]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);

        let err = service
            .register(Some(&user("u1")), NewAttendee::new("Snep", "not-an-email", ["attendance"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "attendee.data.invalid");

        let err = service
            .register(Some(&user("u1")), NewAttendee::new("Snep", "snep@example.com", ["ghost"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));

        service
            .register(Some(&user("u1")), NewAttendee::new("Snep", "snep@example.com", ["attendance"]))
            .await
            .unwrap();
        let err = service
            .register(Some(&user("u2")), NewAttendee::new("Snep", "snep@example.com", ["attendance"]))
            .await
            .unwrap_err();
        assert_eq!(err.status_and_code(), (409, "attendee.data.duplicate"));
    }

    #[tokio::test]
    async fn test_read_access() {
        let (service, _) = RegistrationService::in_memory(config()).unwrap();
        let owner = user("owner");
        let id = service
            .register(Some(&owner), NewAttendee::new("Snep", "snep@example.com", ["attendance"]))
            .await
            .unwrap()
            .id;

        assert!(service.attendee(Some(&owner), id).await.is_ok());
        assert!(service.attendee(Some(&admin()), id).await.is_ok());
        let err = service.attendee(Some(&user("other")), id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = service.attendee(None, id).await.unwrap_err();
        assert_eq!(err.status_code(), 401);

        assert_eq!(service.current_status(Some(&owner), id).await.unwrap(), Status::New);
        let err = service.status_history(Some(&owner), id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let missing = AttendeeId::new(999).unwrap();
        let err = service.attendee(Some(&admin()), missing).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_grant_permission_makes_regdesk() {
        let (service, _) = RegistrationService::in_memory(config()).unwrap();
        let desk = user("desk");
        let desk_id = service
            .register(Some(&desk), NewAttendee::new("Desk", "desk@example.com", ["attendance"]))
            .await
            .unwrap()
            .id;
        let other_id = service
            .register(Some(&user("o")), NewAttendee::new("Other", "o@example.com", ["attendance"]))
            .await
            .unwrap()
            .id;

        assert_eq!(
            service.resolve_role(Some(&desk), other_id).await.unwrap(),
            ActorRole::OtherAuthenticated
        );
        let err = service
            .grant_permission(Some(&desk), desk_id, Permission::Regdesk)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        service
            .grant_permission(Some(&admin()), desk_id, Permission::Regdesk)
            .await
            .unwrap();
        assert_eq!(
            service.resolve_role(Some(&desk), other_id).await.unwrap(),
            ActorRole::Regdesk
        );
        assert_eq!(
            service.current_status(Some(&desk), other_id).await.unwrap(),
            Status::New
        );
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut bad = config();
        bad.downstream.mail_timeout_ms = 0;
        assert!(matches!(
            RegistrationService::in_memory(bad),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
