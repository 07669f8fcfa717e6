use chrono::{DateTime, Utc};
use poppy_core::{MineSet, Verification};
use serde::{Deserialize, Serialize};

/// Nonce as typed by a player: either a JSON number or numeric text.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum NonceInput {
    Number(i64),
    Text(String),
}

impl NonceInput {
    pub fn parse(&self) -> VerifyResult<i64> {
        match self {
            NonceInput::Number(n) => Ok(*n),
            NonceInput::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Err(VerifyError::MissingInput("nonce"));
                }
                s.parse().map_err(|_| VerifyError::InvalidNonce(s.to_string()))
            }
        }
    }
}

impl From<i64> for NonceInput {
    fn from(n: i64) -> Self {
        NonceInput::Number(n)
    }
}

/// Absent fields deserialize as empty so `validate` reports them as missing input.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyRequest {
    #[serde(default)]
    pub server_seed: String,
    #[serde(default)]
    pub client_seed: String,
    #[serde(default)]
    pub nonce: Option<NonceInput>,
    #[serde(default = "default_mine_count")]
    pub mine_count: i64,
}

fn default_mine_count() -> i64 {
    DEFAULT_MINE_COUNT
}

/// Inputs that passed validation and can go straight to the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInputs {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: i64,
    pub mine_count: i64,
}

impl VerifyRequest {
    pub fn validate(&self) -> VerifyResult<SeedInputs> {
        if self.server_seed.is_empty() {
            return Err(VerifyError::MissingInput("server seed"));
        }
        if self.client_seed.is_empty() {
            return Err(VerifyError::MissingInput("client seed"));
        }
        Ok(SeedInputs {
            server_seed: self.server_seed.clone(),
            client_seed: self.client_seed.clone(),
            nonce: self
                .nonce
                .as_ref()
                .ok_or(VerifyError::MissingInput("nonce"))?
                .parse()?,
            mine_count: self.mine_count,
        })
    }
}

impl SeedInputs {
    pub fn verify(&self) -> Verification {
        poppy_core::verify_with_seeds(&self.server_seed, &self.client_seed, self.nonce, self.mine_count)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyResponse {
    pub server_seed_hash: String,
    pub nonce: i64,
    pub mine_count: i64,
    pub mines: Vec<usize>, // discovery order
    pub grid: Vec<Vec<bool>>,
    pub underfilled: bool,
    pub void_picks: usize,
}

impl VerifyResponse {
    pub fn new(inputs: &SeedInputs, verification: &Verification) -> Self {
        Self {
            server_seed_hash: verification.server_seed_hash.clone(),
            nonce: inputs.nonce,
            mine_count: inputs.mine_count,
            mines: verification.mines.cells.clone(),
            grid: verification.grid.rows(),
            underfilled: verification.underfilled(),
            void_picks: verification.mines.void_picks,
        }
    }
}

/// Shareable result record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MineExport {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: i64,
    pub mine_count: i64,
    pub mines: Vec<usize>,
}

impl MineExport {
    pub fn new(inputs: &SeedInputs, mines: &MineSet) -> Self {
        Self {
            server_seed: inputs.server_seed.clone(),
            client_seed: inputs.client_seed.clone(),
            nonce: inputs.nonce,
            mine_count: inputs.mine_count,
            mines: mines.cells.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Last-used form values, stored as typed so an unparsable nonce survives a reload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SavedInputs {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: String,
    pub mine_count: i64,
}

impl Default for SavedInputs {
    fn default() -> Self {
        Self {
            server_seed: String::new(),
            client_seed: String::new(),
            nonce: String::new(),
            mine_count: DEFAULT_MINE_COUNT,
        }
    }
}

pub const DEFAULT_MINE_COUNT: i64 = 3;

impl SavedInputs {
    pub fn to_request(&self) -> VerifyRequest {
        VerifyRequest {
            server_seed: self.server_seed.clone(),
            client_seed: self.client_seed.clone(),
            nonce: Some(NonceInput::Text(self.nonce.clone())),
            mine_count: self.mine_count,
        }
    }

    /// Moves the nonce one round forward or back. Going below zero is refused.
    pub fn step_nonce(&mut self, delta: i64) -> VerifyResult<i64> {
        let current = NonceInput::Text(self.nonce.clone()).parse()?;
        let next = current
            .checked_add(delta)
            .filter(|n| delta >= 0 || *n >= 0)
            .ok_or(VerifyError::NonceOutOfRange(current))?;
        self.nonce = next.to_string();
        Ok(next)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationLogEntry {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: i64,
    pub mine_count: i64,
    pub mines: Vec<usize>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing input: {0}")]
    MissingInput(&'static str),
    #[error("nonce is not an integer: {0:?}")]
    InvalidNonce(String),
    #[error("no round before or after nonce {0}")]
    NonceOutOfRange(i64),
}

pub type VerifyResult<T> = Result<T, VerifyError>;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(#[from] VerifyError),
    #[error("internal server error")]
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(nonce: NonceInput) -> VerifyRequest {
        VerifyRequest {
            server_seed: "serverseed123".into(),
            client_seed: "clientseed".into(),
            nonce: Some(nonce),
            mine_count: 3,
        }
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut req = request(NonceInput::Number(0));
        req.server_seed.clear();
        assert_eq!(req.validate(), Err(VerifyError::MissingInput("server seed")));

        let mut req = request(NonceInput::Number(0));
        req.client_seed.clear();
        assert_eq!(req.validate(), Err(VerifyError::MissingInput("client seed")));

        let req = request(NonceInput::Text("  ".into()));
        assert_eq!(req.validate(), Err(VerifyError::MissingInput("nonce")));
    }

    #[test]
    fn test_absent_json_fields_are_missing_input() {
        let req: VerifyRequest =
            serde_json::from_str(r#"{"server_seed":"s","client_seed":"c","mine_count":3}"#).unwrap();
        assert_eq!(req.validate(), Err(VerifyError::MissingInput("nonce")));

        let req: VerifyRequest = serde_json::from_str(r#"{"client_seed":"c","nonce":1}"#).unwrap();
        assert_eq!(req.mine_count, DEFAULT_MINE_COUNT);
        assert_eq!(req.validate(), Err(VerifyError::MissingInput("server seed")));

        let req: VerifyRequest = serde_json::from_str(r#"{"server_seed":"s","nonce":1}"#).unwrap();
        assert_eq!(req.validate(), Err(VerifyError::MissingInput("client seed")));
    }

    #[test]
    fn test_nonce_text_parsed() {
        let inputs = request(NonceInput::Text(" 12 ".into())).validate().unwrap();
        assert_eq!(inputs.nonce, 12);
        let err = request(NonceInput::Text("twelve".into())).validate().unwrap_err();
        assert_eq!(err, VerifyError::InvalidNonce("twelve".into()));
    }

    #[test]
    fn test_nonce_accepts_number_or_string_json() {
        let a: VerifyRequest = serde_json::from_str(
            r#"{"server_seed":"s","client_seed":"c","nonce":5,"mine_count":3}"#,
        )
        .unwrap();
        let b: VerifyRequest = serde_json::from_str(
            r#"{"server_seed":"s","client_seed":"c","nonce":"5","mine_count":3}"#,
        )
        .unwrap();
        assert_eq!(a.validate().unwrap(), b.validate().unwrap());
    }

    #[test]
    fn test_export_round_trip() {
        let inputs = request(NonceInput::Number(0)).validate().unwrap();
        let verification = inputs.verify();
        let export = MineExport::new(&inputs, &verification.mines);
        let json = export.to_json_pretty().unwrap();
        assert!(json.contains("\"serverSeed\": \"serverseed123\""));
        assert!(json.contains("\"mineCount\": 3"));
        let back = MineExport::from_json(&json).unwrap();
        assert_eq!(back.mines, vec![14, 17, 6]);
        assert_eq!(back, export);
    }

    #[test]
    fn test_response_shape() {
        let inputs = request(NonceInput::Number(0)).validate().unwrap();
        let resp = VerifyResponse::new(&inputs, &inputs.verify());
        assert_eq!(resp.grid.len(), 5);
        assert!(resp.grid[2][4]); // cell 14
        assert!(!resp.underfilled);
    }

    #[test]
    fn test_step_nonce() {
        let mut saved = SavedInputs {
            nonce: "0".into(),
            ..SavedInputs::default()
        };
        assert_eq!(saved.step_nonce(1), Ok(1));
        assert_eq!(saved.nonce, "1");
        assert_eq!(saved.step_nonce(-1), Ok(0));
        assert_eq!(saved.step_nonce(-1), Err(VerifyError::NonceOutOfRange(0)));
        assert_eq!(saved.nonce, "0");
    }
}
