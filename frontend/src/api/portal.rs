use validator::Validate;

use super::{
    client::{encode_component, with_query, ApiClient},
    types::{
        Claim, ClaimPayload, ClaimStatus, ClaimStatusUpdate, DashboardStats, Page, Policy,
        PolicyPayload, PolicyStatus,
    },
};
use crate::error::ApiError;

#[derive(Debug, Clone, Default)]
pub struct PolicyQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<PolicyStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClaimQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<ClaimStatus>,
    pub policy_id: Option<String>,
}

fn check_policy_dates(payload: &PolicyPayload) -> Result<(), ApiError> {
    if payload.end_date <= payload.start_date {
        return Err(ApiError::validation("End date must be after start date"));
    }
    Ok(())
}

impl ApiClient {
    pub async fn list_policies(&self, query: &PolicyQuery) -> Result<Page<Policy>, ApiError> {
        let path = with_query(
            "/policies",
            &[
                ("page", query.page.map(|p| p.to_string())),
                ("perPage", query.per_page.map(|p| p.to_string())),
                ("status", query.status.map(|s| s.as_str().to_string())),
                ("search", query.search.clone()),
            ],
        );
        self.get_json(&path).await
    }

    pub async fn get_policy(&self, id: &str) -> Result<Policy, ApiError> {
        self.get_json(&format!("/policies/{}", encode_component(id)))
            .await
    }

    pub async fn create_policy(&self, payload: &PolicyPayload) -> Result<Policy, ApiError> {
        payload.validate()?;
        check_policy_dates(payload)?;
        let policy: Policy = self.post_json("/policies", payload).await?;
        tracing::info!(policy_id = %policy.id, number = %policy.policy_number, "Policy created");
        Ok(policy)
    }

    pub async fn update_policy(
        &self,
        id: &str,
        payload: &PolicyPayload,
    ) -> Result<Policy, ApiError> {
        payload.validate()?;
        check_policy_dates(payload)?;
        self.put_json(&format!("/policies/{}", encode_component(id)), payload)
            .await
    }

    pub async fn delete_policy(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/policies/{}", encode_component(id)))
            .await?;
        tracing::info!(policy_id = id, "Policy deleted");
        Ok(())
    }

    pub async fn list_claims(&self, query: &ClaimQuery) -> Result<Page<Claim>, ApiError> {
        let path = with_query(
            "/claims",
            &[
                ("page", query.page.map(|p| p.to_string())),
                ("perPage", query.per_page.map(|p| p.to_string())),
                ("status", query.status.map(|s| s.as_str().to_string())),
                ("policyId", query.policy_id.clone()),
            ],
        );
        self.get_json(&path).await
    }

    pub async fn submit_claim(&self, payload: &ClaimPayload) -> Result<Claim, ApiError> {
        payload.validate()?;
        let claim: Claim = self.post_json("/claims", payload).await?;
        tracing::info!(claim_id = %claim.id, policy_id = %claim.policy_id, "Claim submitted");
        Ok(claim)
    }

    pub async fn update_claim_status(
        &self,
        id: &str,
        update: &ClaimStatusUpdate,
    ) -> Result<Claim, ApiError> {
        self.put_json(&format!("/claims/{}/status", encode_component(id)), update)
            .await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get_json("/dashboard/stats").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::http::Pipeline;
    use crate::test_support::transport::{FakeTransport, DELETE, GET, PUT};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: Arc<FakeTransport>) -> ApiClient {
        ApiClient::new(Pipeline::builder(transport).build(), "http://portal.test/api")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn policy_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "policyNumber": "AI-2024-0001",
            "holderName": "Somchai Jaidee",
            "vehiclePlate": "กข 1234",
            "coverageType": "2+",
            "premium": 8900.0,
            "status": "ACTIVE",
            "startDate": "2024-01-01",
            "endDate": "2025-01-01"
        })
    }

    #[tokio::test]
    async fn list_policies_sends_filters_as_query() {
        let transport = FakeTransport::new();
        transport.mock_with(GET, "/api/policies", |_| {
            (
                200,
                json!({ "items": [policy_json("p1")], "page": 2, "perPage": 10, "total": 11 }),
            )
        });

        let page = client(transport.clone())
            .list_policies(&PolicyQuery {
                page: Some(2),
                per_page: Some(10),
                status: Some(PolicyStatus::Active),
                search: None,
            })
            .await
            .unwrap();

        assert_eq!(page.total, 11);
        assert_eq!(page.items[0].status, PolicyStatus::Active);
        let url = &transport.requests_to("/api/policies")[0].url;
        assert!(url.ends_with("/api/policies?page=2&perPage=10&status=ACTIVE"));
    }

    #[tokio::test]
    async fn policy_dates_are_checked_before_sending() {
        let transport = FakeTransport::new();
        let payload = PolicyPayload {
            holder_name: "Somchai Jaidee".into(),
            vehicle_plate: "กข 1234".into(),
            coverage_type: "1".into(),
            premium: 15000.0,
            start_date: date(2024, 6, 1),
            end_date: date(2024, 6, 1),
        };

        let error = client(transport.clone())
            .create_policy(&payload)
            .await
            .unwrap_err();

        assert_eq!(error.code, ErrorCode::ValidationError);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn claim_status_update_and_policy_delete_hit_rest_paths() {
        let transport = FakeTransport::new();
        transport.mock(|when, then| {
            when.method(PUT).path("/api/claims/c-1/status");
            then.status(200).json_body(json!({
                "id": "c-1",
                "claimNumber": "CL-0001",
                "policyId": "p1",
                "status": "APPROVED",
                "incidentDate": "2024-03-02",
                "description": "Rear-ended at a junction",
                "amount": 12000.0,
                "createdAt": "2024-03-03T08:00:00Z"
            }));
        });
        transport.mock(|when, then| {
            when.method(DELETE).path("/api/policies/p1");
            then.status(204);
        });
        let client = client(transport.clone());

        let claim = client
            .update_claim_status(
                "c-1",
                &ClaimStatusUpdate {
                    status: ClaimStatus::Approved,
                    comment: Some("Photos verified".into()),
                },
            )
            .await
            .unwrap();
        client.delete_policy("p1").await.unwrap();

        assert_eq!(claim.status, ClaimStatus::Approved);
        let sent = transport.requests_to("/api/claims/c-1/status")[0].body.clone().unwrap();
        assert_eq!(sent, json!({ "status": "APPROVED", "comment": "Photos verified" }));
        assert_eq!(transport.calls_to("/api/policies/p1"), 1);
    }

    #[tokio::test]
    async fn dashboard_stats_default_missing_breakdown() {
        let transport = FakeTransport::new();
        transport.mock(|when, then| {
            when.method(GET).path("/api/dashboard/stats");
            then.status(200).json_body(json!({
                "totalPolicies": 12,
                "activePolicies": 9,
                "pendingClaims": 2,
                "approvedClaims": 5,
                "totalPremium": 104500.5
            }));
        });

        let stats = client(transport).dashboard_stats().await.unwrap();
        assert_eq!(stats.active_policies, 9);
        assert!(stats.claims_by_status.is_empty());
    }
}
