// src/auth.rs
use pbkdf2::pbkdf2_hmac;
use rand::{thread_rng, RngCore};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::error::{AuthError, PolicyError, Result};
use crate::records::{Employee, Role};

// --- Password Hashing ---

const HASH_SCHEME: &str = "pbkdf2";
const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Hashes a secret as `pbkdf2$<iterations>$<salt-hex>$<hash-hex>`.
pub fn hash_password(secret: &str) -> String {
    hash_password_with_iterations(secret, PBKDF2_ITERATIONS)
}

pub(crate) fn hash_password_with_iterations(secret: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    thread_rng().fill_bytes(&mut salt);
    let key = derive_key(secret, &salt, iterations);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        iterations,
        hex::encode(salt),
        hex::encode(key)
    )
}

fn derive_key(secret: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, iterations, &mut key);
    key
}

pub fn verify_password(secret: &str, stored: &str) -> std::result::Result<bool, AuthError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt_hex), Some(hash_hex), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(AuthError::MalformedHash);
    };
    if scheme != HASH_SCHEME {
        return Err(AuthError::MalformedHash);
    }
    let iterations: u32 = iterations.parse().map_err(|_| AuthError::MalformedHash)?;
    if iterations == 0 {
        return Err(AuthError::MalformedHash);
    }
    let salt = hex::decode(salt_hex).map_err(|_| AuthError::MalformedHash)?;
    let expected = hex::decode(hash_hex).map_err(|_| AuthError::MalformedHash)?;

    let mut derived = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), &salt, iterations, &mut derived);
    Ok(constant_time_eq(&derived, &expected))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Replaces any legacy plaintext `password` with a salted hash. Returns how many were converted.
pub fn upgrade_legacy_passwords(employees: &mut [Employee]) -> usize {
    let mut converted = 0;
    for employee in employees.iter_mut() {
        if let Some(plain) = employee.password.take() {
            if employee.password_hash.is_none() {
                employee.password_hash = Some(hash_password(&plain));
                converted += 1;
            } else {
                debug!("Dropping plaintext password for {}; a hash is already on file", employee.employee_id);
            }
        }
    }
    converted
}

// --- Authentication ---

pub fn authenticate(
    employees: &[Employee],
    email: &str,
    secret: &str,
) -> std::result::Result<Employee, AuthError> {
    let needle = email.trim().to_lowercase();
    let employee = employees
        .iter()
        .find(|e| e.email.trim().to_lowercase() == needle)
        .ok_or(AuthError::UnknownEmail)?;

    let Some(stored) = employee.password_hash.as_deref() else {
        warn!("Login attempt for {} with no credential on file", employee.employee_id);
        return Err(AuthError::MissingCredential {
            employee_id: employee.employee_id.clone(),
        });
    };
    if !verify_password(secret, stored)? {
        warn!("Wrong password for {}", employee.employee_id);
        return Err(AuthError::WrongPassword);
    }
    Ok(employee.clone())
}

// --- Session ---

/// The page a role is sent to after logging in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LandingView {
    EmployeeDashboard,
    ManagerDashboard,
    AdminDashboard,
    SecurityKiosk,
}

pub fn landing_view(role: Role) -> LandingView {
    match role {
        Role::Employee => LandingView::EmployeeDashboard,
        Role::Manager => LandingView::ManagerDashboard,
        Role::Hr | Role::Admin => LandingView::AdminDashboard,
        Role::Security => LandingView::SecurityKiosk,
    }
}

/// Holds the single logged-in employee, if any.
#[derive(Debug, Default, Clone)]
pub struct Session {
    current: Option<Employee>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(&mut self, employees: &[Employee], email: &str, secret: &str) -> Result<&Employee> {
        let employee = authenticate(employees, email, secret)?;
        info!("{} logged in as {}", employee.employee_id, employee.role);
        Ok(self.current.insert(employee))
    }

    pub fn logout(&mut self) {
        if let Some(employee) = self.current.take() {
            info!("{} logged out", employee.employee_id);
        }
    }

    pub fn current(&self) -> Option<&Employee> {
        self.current.as_ref()
    }

    /// The current employee, if their role is one of `allowed`.
    pub fn require(&self, allowed: &[Role]) -> Result<&Employee> {
        let employee = self.current.as_ref().ok_or(PolicyError::NotAuthenticated)?;
        if !allowed.contains(&employee.role) {
            return Err(PolicyError::Unauthorized {
                role: employee.role,
                action: format!("open a view restricted to {}", role_list(allowed)),
            });
        }
        Ok(employee)
    }
}

fn role_list(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn employee(employee_id: &str, email: &str, role: Role, secret: Option<&str>) -> Employee {
        Employee {
            id: 1,
            employee_id: employee_id.to_string(),
            name: employee_id.to_string(),
            email: email.to_string(),
            password_hash: secret.map(|s| hash_password_with_iterations(s, 1_000)),
            password: None,
            role,
            department: "Ops".to_string(),
            manager_id: None,
            daily_wage: dec!(200),
        }
    }

    #[test]
    fn test_hash_is_salted_and_verifies() {
        let a = hash_password_with_iterations("pw", 1_000);
        let b = hash_password_with_iterations("pw", 1_000);
        assert_ne!(a, b);
        assert!(verify_password("pw", &a).unwrap());
        assert!(!verify_password("pW", &a).unwrap());
        assert_eq!(verify_password("pw", "plaintext"), Err(AuthError::MalformedHash));
        assert_eq!(
            verify_password("pw", "pbkdf2$abc$00$00"),
            Err(AuthError::MalformedHash)
        );
    }

    #[test]
    fn test_authenticate_matches_email_case_insensitively() {
        let staff = vec![employee("EMP001", "Ada@Corp.test", Role::Employee, Some("pw"))];
        let found = authenticate(&staff, "ada@corp.TEST", "pw").unwrap();
        assert_eq!(found.employee_id, "EMP001");
        assert_eq!(
            authenticate(&staff, "ada@corp.test", "nope"),
            Err(AuthError::WrongPassword)
        );
        assert_eq!(
            authenticate(&staff, "bob@corp.test", "pw"),
            Err(AuthError::UnknownEmail)
        );
    }

    #[test]
    fn test_missing_credential_is_reported() {
        let staff = vec![employee("EMP002", "b@corp.test", Role::Employee, None)];
        assert_eq!(
            authenticate(&staff, "b@corp.test", "pw"),
            Err(AuthError::MissingCredential {
                employee_id: "EMP002".into()
            })
        );
    }

    #[test]
    fn test_session_requires_login_and_role() {
        let staff = vec![employee("MGR001", "m@corp.test", Role::Manager, Some("pw"))];
        let mut session = Session::new();
        let err = session.require(&[Role::Manager]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(matches!(err, PolicyError::NotAuthenticated));

        session.login(&staff, "m@corp.test", "pw").unwrap();
        assert_eq!(session.require(&[Role::Manager]).unwrap().employee_id, "MGR001");
        assert!(matches!(
            session.require(&[Role::Hr, Role::Admin]),
            Err(PolicyError::Unauthorized { role: Role::Manager, .. })
        ));

        session.logout();
        assert!(session.current().is_none());
    }

    #[test]
    fn test_failed_login_leaves_session_empty() {
        let staff = vec![employee("EMP003", "c@corp.test", Role::Employee, Some("pw"))];
        let mut session = Session::new();
        assert!(session.login(&staff, "c@corp.test", "bad").is_err());
        assert!(session.current().is_none());
    }

    #[test]
    fn test_landing_views() {
        assert_eq!(landing_view(Role::Security), LandingView::SecurityKiosk);
        assert_eq!(landing_view(Role::Hr), LandingView::AdminDashboard);
        assert_eq!(landing_view(Role::Manager), LandingView::ManagerDashboard);
    }

    #[test]
    fn test_upgrade_hashes_plaintext_once() {
        let mut staff = vec![employee("EMP004", "d@corp.test", Role::Employee, None)];
        staff[0].password = Some("legacy".into());
        assert_eq!(upgrade_legacy_passwords(&mut staff), 1);
        assert!(staff[0].password.is_none());
        assert!(verify_password("legacy", staff[0].password_hash.as_deref().unwrap()).unwrap());
        assert_eq!(upgrade_legacy_passwords(&mut staff), 0);
    }
}
