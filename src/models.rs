use serde::{Deserialize, Serialize};

/// Which external measurement a market resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    EthStakingRate,
    EthPrice,
    BtcPrice,
    /// Manual resolution only - the metric never produces a value, so the
    /// worker leaves these markets alone and an operator resolves via CLI.
    Generic,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::EthStakingRate => "eth_staking_rate",
            MetricType::EthPrice => "eth_price",
            MetricType::BtcPrice => "btc_price",
            MetricType::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eth_staking_rate" => Some(MetricType::EthStakingRate),
            "eth_price" => Some(MetricType::EthPrice),
            "btc_price" => Some(MetricType::BtcPrice),
            "generic" => Some(MetricType::Generic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Pending,
    Resolved,
}

impl MarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Pending => "pending",
            MarketStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MarketStatus::Pending),
            "resolved" => Some(MarketStatus::Resolved),
            _ => None,
        }
    }
}

/// A prediction-market pool awaiting settlement.
///
/// `market_id` is the on-chain pool key, an Aleo field literal such as
/// `"1field"`. `deadline` is unix seconds; once `now >= deadline` the worker
/// reads the metric, compares against `threshold` and resolves the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub market_id: String,
    pub title: String,
    pub description: String,
    pub deadline: i64,
    pub threshold: f64,
    pub metric_type: MetricType,
    pub status: MarketStatus,
    pub created_at: i64,
}

impl Market {
    pub fn new(market_id: String, deadline: i64, threshold: f64, metric_type: MetricType) -> Self {
        Self {
            market_id,
            title: String::new(),
            description: String::new(),
            deadline,
            threshold,
            metric_type,
            status: MarketStatus::Pending,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_title(mut self, title: String) -> Self {
        self.title = title;
        self
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.status == MarketStatus::Pending && now >= self.deadline
    }
}

/// Winning option of a binary pool, as encoded by `prediction.aleo`:
/// option 1 is YES, option 2 is NO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// Threshold comparison used for settlement. Ties favour YES.
    pub fn decide(value: f64, threshold: f64) -> Self {
        if value >= threshold {
            Outcome::Yes
        } else {
            Outcome::No
        }
    }

    pub fn from_option_number(n: u64) -> Option<Self> {
        match n {
            1 => Some(Outcome::Yes),
            2 => Some(Outcome::No),
            _ => None,
        }
    }

    pub fn option_number(&self) -> u64 {
        match self {
            Outcome::Yes => 1,
            Outcome::No => 2,
        }
    }

    /// Aleo input literal, e.g. `"1u64"`.
    pub fn as_input_literal(&self) -> String {
        format!("{}u64", self.option_number())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }
}
