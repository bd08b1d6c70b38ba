use crate::domain::port::{LogLevel, Logger};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// ログエントリ
/// 構造化ログの1行分
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    pub correlation_id: Option<Uuid>,
    /// キー順に出力するためBTreeMapで保持
    pub context: BTreeMap<String, String>,
}

impl LogEntry {
    /// 新しいログエントリを作成
    pub fn new(level: LogLevel, component: &str, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: component.to_string(),
            message: message.to_string(),
            correlation_id: None,
            context: BTreeMap::new(),
        }
    }

    /// 相関IDを設定
    pub fn with_correlation_id(mut self, correlation_id: Option<Uuid>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// 追加コンテキストを設定
    pub fn with_context(mut self, context: Option<HashMap<String, String>>) -> Self {
        if let Some(context) = context {
            self.context.extend(context);
        }
        self
    }

    /// ログエントリを文字列として出力
    /// `[時刻] [レベル] [コンポーネント] [correlation_id: ..] メッセージ [k=v, ..]`
    pub fn format(&self) -> String {
        let level_str = match self.level {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };

        let mut parts = vec![
            format!("[{}]", self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
            format!("[{}]", level_str),
            format!("[{}]", self.component),
        ];

        if let Some(correlation_id) = self.correlation_id {
            parts.push(format!("[correlation_id: {}]", correlation_id));
        }

        parts.push(self.message.clone());

        if !self.context.is_empty() {
            let context_str = self
                .context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("[{}]", context_str));
        }

        parts.join(" ")
    }
}

/// コンソールログ実装
/// debug/infoは標準出力、warn/errorは標準エラー出力に書く
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self::with_min_level(LogLevel::Info)
    }

    /// 指定レベル未満のログを出力しないロガーを作成
    pub fn with_min_level(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn write(
        &self,
        level: LogLevel,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        if !self.is_enabled(level) {
            return;
        }

        let entry = LogEntry::new(level, component, message)
            .with_correlation_id(correlation_id)
            .with_context(context);

        match level {
            LogLevel::Debug | LogLevel::Info => println!("{}", entry.format()),
            LogLevel::Warning | LogLevel::Error => eprintln!("{}", entry.format()),
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for ConsoleLogger {
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.write(LogLevel::Debug, component, message, correlation_id, context);
    }

    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.write(LogLevel::Info, component, message, correlation_id, context);
    }

    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.write(LogLevel::Warning, component, message, correlation_id, context);
    }

    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.write(LogLevel::Error, component, message, correlation_id, context);
    }
}
