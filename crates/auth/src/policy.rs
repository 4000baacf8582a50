//! Static role/route permission table and the authorization decision.
//!
//! The table is loaded once at startup from a policy document mapping
//! `role -> service -> method -> [route templates]`. Absence of an entry means
//! "not granted"; every decision fails closed.
//!
//! - No IO
//! - No panics
//! - No business logic beyond the documented decision order

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use campuskit_core::{AuthError, AuthResult, DenyReason, TenantId};

use crate::directory::{Account, AccountStatus, TenantMembership};

/// Reserved pseudo-role: grants are not tenant-scoped and apply regardless of
/// the caller's tenant context.
pub const GLOBAL_ROLE: &str = "all";

/// HTTP-style method dimension of the permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn parse(s: &str) -> AuthResult<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(AuthError::validation(format!("unknown method: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// On-disk shape of the policy document.
///
/// ```json
/// {
///   "roles": {
///     "student": { "users": { "GET": ["/api/v1/users/:id"] } },
///     "all":     { "schools": { "GET": ["/api/v1/schools"] } }
///   },
///   "self_service": { "users": ["/api/v1/users/:id"] }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDocument {
    pub roles: HashMap<String, HashMap<String, HashMap<String, Vec<String>>>>,

    /// Route templates restricted to the caller's own identity, per service.
    #[serde(default)]
    pub self_service: HashMap<String, Vec<String>>,
}

/// Compiled permission table.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    grants: HashMap<(String, String, Method), HashSet<String>>,
    self_service: HashSet<(String, String)>,
}

impl PolicyTable {
    pub fn from_json(raw: &str) -> AuthResult<Self> {
        let doc: PolicyDocument = serde_json::from_str(raw)
            .map_err(|e| AuthError::validation(format!("policy document: {e}")))?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: PolicyDocument) -> AuthResult<Self> {
        let mut grants: HashMap<(String, String, Method), HashSet<String>> = HashMap::new();
        for (role, services) in doc.roles {
            for (service, methods) in services {
                for (method, routes) in methods {
                    let method = Method::parse(&method)?;
                    grants
                        .entry((role.clone(), service.clone(), method))
                        .or_default()
                        .extend(routes);
                }
            }
        }

        let mut self_service = HashSet::new();
        for (service, routes) in doc.self_service {
            for route in routes {
                self_service.insert((service.clone(), route));
            }
        }

        Ok(Self {
            grants,
            self_service,
        })
    }

    /// Whether `role` grants `method route` on `service`.
    pub fn grants(&self, role: &str, service: &str, method: Method, route: &str) -> bool {
        self.grants
            .get(&(role.to_string(), service.to_string(), method))
            .is_some_and(|routes| routes.contains(route))
    }

    /// Whether this route is restricted to the caller's own identity.
    pub fn is_self_service(&self, service: &str, route: &str) -> bool {
        self.self_service
            .contains(&(service.to_string(), route.to_string()))
    }
}

/// A request as seen by the decision engine: the matched route template plus
/// the concrete path it matched.
#[derive(Debug, Clone)]
pub struct RouteRequest<'a> {
    pub service: &'a str,
    pub method: Method,
    /// Route template, e.g. `/api/v1/users/:id`.
    pub route: &'a str,
    /// Actual request path, e.g. `/api/v1/users/4ae3...`.
    pub path: &'a str,
    /// Tenant scope of the request, when one was resolved.
    pub tenant_id: Option<TenantId>,
}

/// Decide whether `account` may perform `req`.
///
/// Decision order (each step fails closed):
/// 1. a global `"all"` grant allows immediately, skipping tenant checks;
/// 2. the request's tenant must resolve to one of the caller's memberships;
/// 3. a disabled membership never authorizes;
/// 4. some role within the membership must grant the method/route;
/// 5. same-identity-only routes additionally require the `:id` path segment to
///    be the caller's own identity, even when a role grants the route.
///
/// Returns the membership the decision was scoped to (`None` for global
/// grants).
pub fn authorize<'a>(
    table: &PolicyTable,
    account: &'a Account,
    req: &RouteRequest<'_>,
) -> Result<Option<&'a TenantMembership>, DenyReason> {
    if account.roles.iter().any(|r| r == GLOBAL_ROLE)
        && table.grants(GLOBAL_ROLE, req.service, req.method, req.route)
    {
        return Ok(None);
    }

    let membership = req
        .tenant_id
        .and_then(|tenant_id| account.membership(tenant_id))
        .ok_or(DenyReason::NoSuchTenantMembership)?;

    if membership.status == AccountStatus::Disabled {
        return Err(DenyReason::TenantDisabled);
    }

    let granted = membership
        .roles
        .iter()
        .any(|role| table.grants(role, req.service, req.method, req.route));
    if !granted {
        return Err(DenyReason::RouteNotAccessible);
    }

    if table.is_self_service(req.service, req.route) {
        let owned = resolve_id_param(req.route, req.path)
            .is_some_and(|id| id == account.identity || id == account.id.to_string());
        if !owned {
            return Err(DenyReason::IdentityRestriction);
        }
    }

    Ok(Some(membership))
}

/// Extract the segment bound to `:id` by matching `path` against `template`
/// segment-by-segment.
///
/// The match is exact on shape: `/x/:id` does not match `/x/a/b`, and literal
/// segments must be equal. Other `:params` match any single segment.
fn resolve_id_param<'a>(template: &str, path: &'a str) -> Option<&'a str> {
    let template: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if template.len() != path.len() {
        return None;
    }

    let mut bound = None;
    for (t, p) in template.iter().zip(path.iter()) {
        if *t == ":id" {
            bound = Some(*p);
        } else if t.starts_with(':') {
            continue;
        } else if t != p {
            return None;
        }
    }
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use campuskit_core::AccountId;

    const DOC: &str = r#"{
        "roles": {
            "student": {
                "users": { "GET": ["/api/v1/users/:id"] },
                "groups": { "GET": ["/api/v1/groups"] }
            },
            "teacher": {
                "groups": { "GET": ["/api/v1/groups"], "POST": ["/api/v1/groups"] }
            },
            "all": {
                "schools": { "GET": ["/api/v1/schools"], "DELETE": ["/api/v1/schools/:id"] }
            }
        },
        "self_service": {
            "users": ["/api/v1/users/:id"]
        }
    }"#;

    fn table() -> PolicyTable {
        PolicyTable::from_json(DOC).unwrap()
    }

    fn student(tenant_id: TenantId) -> Account {
        Account {
            id: AccountId::new(),
            identity: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
            status: AccountStatus::Active,
            roles: Vec::new(),
            tenants: vec![TenantMembership {
                tenant_id,
                display_name: "School One".to_string(),
                status: AccountStatus::Active,
                roles: vec!["student".to_string()],
            }],
        }
    }

    fn get_groups<'a>(tenant_id: Option<TenantId>) -> RouteRequest<'a> {
        RouteRequest {
            service: "groups",
            method: Method::Get,
            route: "/api/v1/groups",
            path: "/api/v1/groups",
            tenant_id,
        }
    }

    #[test]
    fn document_parses_and_grants() {
        let table = table();
        assert!(table.grants("student", "groups", Method::Get, "/api/v1/groups"));
        assert!(!table.grants("student", "groups", Method::Post, "/api/v1/groups"));
        assert!(!table.grants("student", "schools", Method::Get, "/api/v1/schools"));
        assert!(table.is_self_service("users", "/api/v1/users/:id"));
        assert!(!table.is_self_service("groups", "/api/v1/groups"));
    }

    #[test]
    fn unknown_method_in_document_is_a_startup_error() {
        let raw = r#"{ "roles": { "x": { "svc": { "FETCH": ["/a"] } } } }"#;
        assert!(PolicyTable::from_json(raw).is_err());
    }

    #[test]
    fn tenant_role_grants_route() {
        let tenant = TenantId::new();
        let account = student(tenant);
        let result = authorize(&table(), &account, &get_groups(Some(tenant)));
        assert_eq!(result.unwrap().unwrap().tenant_id, tenant);
    }

    #[test]
    fn missing_membership_denies() {
        let account = student(TenantId::new());
        assert_eq!(
            authorize(&table(), &account, &get_groups(Some(TenantId::new()))),
            Err(DenyReason::NoSuchTenantMembership)
        );
        assert_eq!(
            authorize(&table(), &account, &get_groups(None)),
            Err(DenyReason::NoSuchTenantMembership)
        );
    }

    #[test]
    fn disabled_membership_denies_regardless_of_roles() {
        let tenant = TenantId::new();
        let mut account = student(tenant);
        account.tenants[0].status = AccountStatus::Disabled;
        assert_eq!(
            authorize(&table(), &account, &get_groups(Some(tenant))),
            Err(DenyReason::TenantDisabled)
        );
    }

    #[test]
    fn ungranted_route_denies() {
        let tenant = TenantId::new();
        let account = student(tenant);
        let req = RouteRequest {
            service: "groups",
            method: Method::Post,
            route: "/api/v1/groups",
            path: "/api/v1/groups",
            tenant_id: Some(tenant),
        };
        assert_eq!(
            authorize(&table(), &account, &req),
            Err(DenyReason::RouteNotAccessible)
        );
    }

    #[test]
    fn self_service_route_requires_own_identity() {
        let tenant = TenantId::new();
        let account = student(tenant);

        let own = format!("/api/v1/users/{}", account.id);
        let req = RouteRequest {
            service: "users",
            method: Method::Get,
            route: "/api/v1/users/:id",
            path: &own,
            tenant_id: Some(tenant),
        };
        assert!(authorize(&table(), &account, &req).is_ok());

        let req = RouteRequest {
            path: "/api/v1/users/somebody-else",
            ..req
        };
        assert_eq!(
            authorize(&table(), &account, &req),
            Err(DenyReason::IdentityRestriction)
        );
    }

    #[test]
    fn self_service_accepts_identity_as_well_as_account_id() {
        let tenant = TenantId::new();
        let account = student(tenant);
        let req = RouteRequest {
            service: "users",
            method: Method::Get,
            route: "/api/v1/users/:id",
            path: "/api/v1/users/alice@example.com",
            tenant_id: Some(tenant),
        };
        assert!(authorize(&table(), &account, &req).is_ok());
    }

    #[test]
    fn global_all_role_bypasses_tenant_checks() {
        let mut account = student(TenantId::new());
        account.roles = vec![GLOBAL_ROLE.to_string()];
        account.tenants.clear();

        let req = RouteRequest {
            service: "schools",
            method: Method::Get,
            route: "/api/v1/schools",
            path: "/api/v1/schools",
            tenant_id: None,
        };
        assert_eq!(authorize(&table(), &account, &req), Ok(None));
    }

    #[test]
    fn global_all_role_does_not_grant_unlisted_routes() {
        let tenant = TenantId::new();
        let mut account = student(tenant);
        account.roles = vec![GLOBAL_ROLE.to_string()];

        // Not in the "all" table; falls through to the tenant path and the
        // student role decides.
        let result = authorize(&table(), &account, &get_groups(Some(tenant)));
        assert!(result.unwrap().is_some());
    }

    #[test]
    fn id_param_matching_is_segment_exact() {
        assert_eq!(
            resolve_id_param("/api/v1/users/:id", "/api/v1/users/alice"),
            Some("alice")
        );
        // Shape mismatch: extra trailing segment.
        assert_eq!(
            resolve_id_param("/api/v1/users/:id", "/api/v1/users/alice/groups"),
            None
        );
        // Literal segment mismatch.
        assert_eq!(
            resolve_id_param("/api/v1/users/:id", "/api/v1/groups/alice"),
            None
        );
        // Other params match any segment but bind nothing.
        assert_eq!(
            resolve_id_param("/api/v1/schools/:school/users/:id", "/api/v1/schools/s1/users/alice"),
            Some("alice")
        );
        assert_eq!(resolve_id_param("/api/v1/users", "/api/v1/users"), None);
    }
}
