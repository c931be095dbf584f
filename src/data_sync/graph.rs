use crate::data_sync::rounds::{MarketData, RoundDataProvider};
use crate::error::FetchError;
use crate::state::{BetPosition, Round};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const ROUND_FIELDS: &str = "id epoch startAt startBlock lockAt lockBlock lockPrice endBlock closePrice \
     totalBets totalAmount bullBets bullAmount bearBets bearAmount position";

#[derive(Debug, Deserialize)]
struct GraphResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQueryError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQueryError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MarketQuery {
    market: Option<MarketResponse>,
}

#[derive(Debug, Deserialize)]
struct MarketResponse {
    paused: bool,
    epoch: EpochRef,
}

#[derive(Debug, Deserialize)]
struct EpochRef {
    epoch: String,
}

#[derive(Debug, Deserialize)]
struct RoundsQuery {
    rounds: Vec<RoundResponse>,
}

/// Round record as served by the prediction subgraph. Numbers arrive as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResponse {
    pub id: String,
    pub epoch: String,
    pub start_at: Option<String>,
    pub start_block: String,
    pub lock_at: Option<String>,
    pub lock_block: Option<String>,
    pub lock_price: Option<String>,
    pub end_block: Option<String>,
    pub close_price: Option<String>,
    pub total_bets: String,
    pub total_amount: String,
    pub bull_bets: String,
    pub bull_amount: String,
    pub bear_bets: String,
    pub bear_amount: String,
    pub position: Option<String>,
}

fn parse_u64(field: &str, value: &str) -> Result<u64, FetchError> {
    value
        .parse()
        .map_err(|_| FetchError::InvalidResponse(format!("{} is not an integer: {}", field, value)))
}

fn parse_f64(field: &str, value: &str) -> Result<f64, FetchError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FetchError::InvalidResponse(format!("{} is not a number: {}", field, value)))
}

fn parse_opt<T>(
    field: &str,
    value: Option<&String>,
    parse: fn(&str, &str) -> Result<T, FetchError>,
) -> Result<Option<T>, FetchError> {
    value.map(|v| parse(field, v)).transpose()
}

impl TryFrom<RoundResponse> for Round {
    type Error = FetchError;

    fn try_from(response: RoundResponse) -> Result<Self, Self::Error> {
        let close_price = parse_opt("closePrice", response.close_price.as_ref(), parse_f64)?;
        let position = response
            .position
            .as_deref()
            .map(|p| {
                BetPosition::from_str(p).map_err(|_| FetchError::InvalidResponse(format!("Unknown position: {}", p)))
            })
            .transpose()?;

        Ok(Round {
            epoch: parse_u64("epoch", &response.epoch)?,
            start_block: parse_u64("startBlock", &response.start_block)?,
            start_at: parse_opt("startAt", response.start_at.as_ref(), parse_u64)?,
            lock_at: parse_opt("lockAt", response.lock_at.as_ref(), parse_u64)?,
            lock_block: parse_opt("lockBlock", response.lock_block.as_ref(), parse_u64)?,
            lock_price: parse_opt("lockPrice", response.lock_price.as_ref(), parse_f64)?,
            end_block: parse_opt("endBlock", response.end_block.as_ref(), parse_u64)?,
            close_price,
            total_bets: parse_u64("totalBets", &response.total_bets)?,
            total_amount: parse_f64("totalAmount", &response.total_amount)?,
            bull_bets: parse_u64("bullBets", &response.bull_bets)?,
            bull_amount: parse_f64("bullAmount", &response.bull_amount)?,
            bear_bets: parse_u64("bearBets", &response.bear_bets)?,
            bear_amount: parse_f64("bearAmount", &response.bear_amount)?,
            reward_base_cal_amount: 0.0,
            reward_amount: 0.0,
            oracle_called: close_price.is_some(),
            position,
            id: response.id,
        })
    }
}

/// Round data from the prediction subgraph over GraphQL.
#[derive(Debug, Clone)]
pub struct GraphRoundProvider {
    http_client: reqwest::Client,
    graph_url: String,
}

impl GraphRoundProvider {
    pub fn new(graph_url: String, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client, graph_url })
    }

    async fn query<T: DeserializeOwned>(&self, query: String) -> Result<T, FetchError> {
        let response = self.http_client
            .post(&self.graph_url)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?
            .error_for_status()?;

        let envelope: GraphResponse<T> = response.json().await?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope<T>(envelope: GraphResponse<T>) -> Result<T, FetchError> {
    if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(FetchError::Graph(messages.join("; ")));
    }
    envelope
        .data
        .ok_or_else(|| FetchError::InvalidResponse("Missing data in graph response".to_string()))
}

fn rounds_to_vec(query: RoundsQuery) -> Result<Vec<Round>, FetchError> {
    query.rounds.into_iter().map(Round::try_from).collect()
}

pub fn latest_rounds_query(first: usize, up_to_epoch: u64) -> String {
    format!(
        "{{ rounds(first: {}, orderBy: epoch, orderDirection: desc, where: {{ epoch_lte: \"{}\" }}) {{ {} }} }}",
        first, up_to_epoch, ROUND_FIELDS
    )
}

pub fn rounds_by_epoch_query(epochs: &[u64]) -> String {
    let ids: Vec<String> = epochs.iter().map(|epoch| format!("\"{}\"", epoch)).collect();
    format!(
        "{{ rounds(where: {{ id_in: [{}] }}) {{ {} }} }}",
        ids.join(", "),
        ROUND_FIELDS
    )
}

#[async_trait]
impl RoundDataProvider for GraphRoundProvider {
    async fn fetch_market(&self) -> Result<MarketData, FetchError> {
        let query = "{ market(id: 1) { paused epoch { epoch } } }".to_string();
        let response: MarketQuery = self.query(query).await?;
        let market = response
            .market
            .ok_or_else(|| FetchError::InvalidResponse("Market not found".to_string()))?;

        Ok(MarketData {
            current_epoch: parse_u64("epoch", &market.epoch.epoch)?,
            paused: market.paused,
        })
    }

    async fn fetch_latest_rounds(&self, first: usize, up_to_epoch: u64) -> Result<Vec<Round>, FetchError> {
        let response: RoundsQuery = self.query(latest_rounds_query(first, up_to_epoch)).await?;
        let rounds = rounds_to_vec(response)?;
        debug!("Fetched {} latest rounds", rounds.len());
        Ok(rounds)
    }

    async fn fetch_rounds(&self, epochs: &[u64]) -> Result<Vec<Round>, FetchError> {
        if epochs.is_empty() {
            return Ok(Vec::new());
        }
        let response: RoundsQuery = self.query(rounds_by_epoch_query(epochs)).await?;
        rounds_to_vec(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_json() -> serde_json::Value {
        serde_json::json!({
            "id": "1234",
            "epoch": "1234",
            "startAt": "1619999000",
            "startBlock": "7000000",
            "lockAt": "1620000000",
            "lockBlock": "7000100",
            "lockPrice": "565.12",
            "endBlock": null,
            "closePrice": null,
            "totalBets": "42",
            "totalAmount": "18.5",
            "bullBets": "30",
            "bullAmount": "12.25",
            "bearBets": "12",
            "bearAmount": "6.25",
            "position": null
        })
    }

    #[test]
    fn test_round_response_transform() {
        let response: RoundResponse = serde_json::from_value(round_json()).unwrap();
        let round = Round::try_from(response).unwrap();

        assert_eq!(round.epoch, 1234);
        assert_eq!(round.lock_block, Some(7_000_100));
        assert_eq!(round.lock_price, Some(565.12));
        assert_eq!(round.close_price, None);
        assert_eq!(round.total_bets, 42);
        assert_eq!(round.bull_amount, 12.25);
        assert!(!round.oracle_called);
    }

    #[test]
    fn test_closed_round_transform() {
        let mut value = round_json();
        value["closePrice"] = serde_json::json!("570.00");
        value["endBlock"] = serde_json::json!("7000200");
        value["position"] = serde_json::json!("Bull");

        let round = Round::try_from(serde_json::from_value::<RoundResponse>(value).unwrap()).unwrap();
        assert!(round.oracle_called);
        assert_eq!(round.position, Some(BetPosition::Bull));
        assert_eq!(round.end_block, Some(7_000_200));
    }

    #[test]
    fn test_bad_number_rejected() {
        let mut value = round_json();
        value["totalAmount"] = serde_json::json!("lots");
        let response: RoundResponse = serde_json::from_value(value).unwrap();
        assert!(matches!(Round::try_from(response), Err(FetchError::InvalidResponse(_))));
    }

    #[test]
    fn test_envelope_errors() {
        let envelope: GraphResponse<RoundsQuery> =
            serde_json::from_str(r#"{"data": null, "errors": [{"message": "indexing failed"}]}"#).unwrap();
        assert!(matches!(unwrap_envelope(envelope), Err(FetchError::Graph(msg)) if msg == "indexing failed"));

        let envelope: GraphResponse<RoundsQuery> = serde_json::from_str(r#"{"data": {"rounds": []}}"#).unwrap();
        assert!(unwrap_envelope(envelope).unwrap().rounds.is_empty());
    }

    #[test]
    fn test_queries() {
        let latest = latest_rounds_query(5, 42);
        assert!(latest.contains("rounds(first: 5, orderBy: epoch, orderDirection: desc, where: { epoch_lte: \"42\" })"));
        assert!(rounds_by_epoch_query(&[4, 5]).contains(r#"id_in: ["4", "5"]"#));
    }
}
