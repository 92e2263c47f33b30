use serde::Serialize;

#[derive(Serialize)]
pub struct ProcessEmailResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
