use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The four analyst desks that produce the reports every later stage reads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AnalystKind {
    Market,
    Social,
    News,
    Fundamentals,
}

impl AnalystKind {
    pub const ALL: [AnalystKind; 4] = [
        AnalystKind::Market,
        AnalystKind::Social,
        AnalystKind::News,
        AnalystKind::Fundamentals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalystKind::Market => "market",
            AnalystKind::Social => "social",
            AnalystKind::News => "news",
            AnalystKind::Fundamentals => "fundamentals",
        }
    }
}

impl std::fmt::Display for AnalystKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who spoke last in the bull/bear debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Researcher {
    Bull,
    Bear,
}

/// Who spoke last in the risk debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskSpeaker {
    Risky,
    Safe,
    Neutral,
    Judge,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A data-fetch request emitted by a language model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One entry in the run's message log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    /// Name of the node that produced this message.
    pub sender: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool results; links back to `ToolCall::id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            sender: sender.into(),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            sender: sender.into(),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(
        sender: impl Into<String>,
        call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: MessageRole::Tool,
            sender: sender.into(),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Bull/bear researcher debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvestmentDebateState {
    pub bull_history: String,
    pub bear_history: String,
    pub history: String,
    pub current_response: String,
    pub latest_speaker: Option<Researcher>,
    pub judge_decision: String,
    /// Researcher turns taken so far.
    pub count: u32,
}

/// Risky/safe/neutral risk debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskDebateState {
    pub risky_history: String,
    pub safe_history: String,
    pub neutral_history: String,
    pub history: String,
    pub latest_speaker: Option<RiskSpeaker>,
    pub current_risky_response: String,
    pub current_safe_response: String,
    pub current_neutral_response: String,
    pub judge_decision: String,
    /// Debator turns taken so far.
    pub count: u32,
}

/// Everything a single decision run knows. Threaded through the graph by value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionState {
    pub subject: String,
    pub trade_date: NaiveDate,
    pub market_report: String,
    pub sentiment_report: String,
    pub news_report: String,
    pub fundamentals_report: String,
    pub investment_debate: InvestmentDebateState,
    /// Research judge's plan handed to the trader.
    pub investment_plan: String,
    pub trader_plan: String,
    pub risk_debate: RiskDebateState,
    pub final_decision: String,
    pub messages: Vec<Message>,
}

impl DecisionState {
    pub fn new(subject: impl Into<String>, trade_date: NaiveDate) -> Self {
        Self {
            subject: subject.into(),
            trade_date,
            market_report: String::new(),
            sentiment_report: String::new(),
            news_report: String::new(),
            fundamentals_report: String::new(),
            investment_debate: InvestmentDebateState::default(),
            investment_plan: String::new(),
            trader_plan: String::new(),
            risk_debate: RiskDebateState::default(),
            final_decision: String::new(),
            messages: Vec::new(),
        }
    }

    pub fn report(&self, kind: AnalystKind) -> &str {
        match kind {
            AnalystKind::Market => &self.market_report,
            AnalystKind::Social => &self.sentiment_report,
            AnalystKind::News => &self.news_report,
            AnalystKind::Fundamentals => &self.fundamentals_report,
        }
    }

    /// The four reports joined in a fixed order. Used both as model context and as the
    /// memory lookup key.
    pub fn situation(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\n{}",
            self.market_report, self.sentiment_report, self.news_report, self.fundamentals_report
        )
    }

    /// Merge a node's patch. Present fields overwrite; messages are appended.
    pub fn apply(&mut self, patch: StatePatch) {
        let StatePatch {
            market_report,
            sentiment_report,
            news_report,
            fundamentals_report,
            investment_debate,
            investment_plan,
            trader_plan,
            risk_debate,
            final_decision,
            messages,
        } = patch;

        if let Some(v) = market_report {
            self.market_report = v;
        }
        if let Some(v) = sentiment_report {
            self.sentiment_report = v;
        }
        if let Some(v) = news_report {
            self.news_report = v;
        }
        if let Some(v) = fundamentals_report {
            self.fundamentals_report = v;
        }
        if let Some(v) = investment_debate {
            self.investment_debate = v;
        }
        if let Some(v) = investment_plan {
            self.investment_plan = v;
        }
        if let Some(v) = trader_plan {
            self.trader_plan = v;
        }
        if let Some(v) = risk_debate {
            self.risk_debate = v;
        }
        if let Some(v) = final_decision {
            self.final_decision = v;
        }
        self.messages.extend(messages);
    }
}

/// Partial update returned by a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub market_report: Option<String>,
    pub sentiment_report: Option<String>,
    pub news_report: Option<String>,
    pub fundamentals_report: Option<String>,
    pub investment_debate: Option<InvestmentDebateState>,
    pub investment_plan: Option<String>,
    pub trader_plan: Option<String>,
    pub risk_debate: Option<RiskDebateState>,
    pub final_decision: Option<String>,
    /// Appended to the log, never replacing it.
    pub messages: Vec<Message>,
}

impl StatePatch {
    pub fn with_report(mut self, kind: AnalystKind, report: String) -> Self {
        match kind {
            AnalystKind::Market => self.market_report = Some(report),
            AnalystKind::Social => self.sentiment_report = Some(report),
            AnalystKind::News => self.news_report = Some(report),
            AnalystKind::Fundamentals => self.fundamentals_report = Some(report),
        }
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}
