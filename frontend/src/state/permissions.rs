use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Whether this role holds `permission`. Super admins hold everything.
    pub fn grants(self, permission: Permission) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Admin => ADMIN_PERMISSIONS.contains(&permission),
            Role::Customer => CUSTOMER_PERMISSIONS.contains(&permission),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewDashboard,
    ViewPolicies,
    ManagePolicies,
    ViewClaims,
    SubmitClaims,
    ProcessClaims,
    ViewReports,
    ManageUsers,
    ManageSettings,
}

const CUSTOMER_PERMISSIONS: &[Permission] = &[
    Permission::ViewDashboard,
    Permission::ViewPolicies,
    Permission::ViewClaims,
    Permission::SubmitClaims,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ViewDashboard,
    Permission::ViewPolicies,
    Permission::ViewClaims,
    Permission::SubmitClaims,
    Permission::ManagePolicies,
    Permission::ProcessClaims,
    Permission::ViewReports,
    Permission::ManageUsers,
];
