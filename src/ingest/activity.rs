use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One simulated agent action, with the arguments that action carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentAction {
    CreatePost { content: Option<String> },
    LikePost { post_id: Option<String> },
    DislikePost { post_id: Option<String> },
    Repost { post_id: Option<String> },
    QuotePost { quoted_id: Option<String>, content: Option<String> },
    Follow { target_id: Option<String> },
    CreateComment { post_id: Option<String>, content: Option<String> },
    LikeComment { comment_id: Option<String> },
    DislikeComment { comment_id: Option<String> },
    SearchPosts { query: Option<String> },
    SearchUser { query: Option<String> },
    Mute { target_id: Option<String> },
    DoNothing,
    Other { action_type: String },
}

/// Argument as text; numeric ids are accepted. Empty strings count as absent.
fn arg(args: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match args.get(*k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl AgentAction {
    /// Build from an `action_type` tag and its raw `action_args`.
    pub fn from_parts(action_type: &str, args: &Map<String, Value>) -> Self {
        match action_type {
            "CREATE_POST" => Self::CreatePost {
                content: arg(args, &["content"]),
            },
            "LIKE_POST" => Self::LikePost {
                post_id: arg(args, &["post_id"]),
            },
            "DISLIKE_POST" => Self::DislikePost {
                post_id: arg(args, &["post_id"]),
            },
            "REPOST" => Self::Repost {
                post_id: arg(args, &["post_id"]),
            },
            "QUOTE_POST" => Self::QuotePost {
                quoted_id: arg(args, &["quoted_id"]),
                content: arg(args, &["content"]),
            },
            "FOLLOW" => Self::Follow {
                target_id: arg(args, &["user_id", "target_id"]),
            },
            "CREATE_COMMENT" => Self::CreateComment {
                post_id: arg(args, &["post_id"]),
                content: arg(args, &["content"]),
            },
            "LIKE_COMMENT" => Self::LikeComment {
                comment_id: arg(args, &["comment_id"]),
            },
            "DISLIKE_COMMENT" => Self::DislikeComment {
                comment_id: arg(args, &["comment_id"]),
            },
            "SEARCH_POSTS" => Self::SearchPosts {
                query: arg(args, &["query", "keyword"]),
            },
            "SEARCH_USER" => Self::SearchUser {
                query: arg(args, &["query", "username"]),
            },
            "MUTE" => Self::Mute {
                target_id: arg(args, &["user_id", "target_id"]),
            },
            "DO_NOTHING" => Self::DoNothing,
            other => Self::Other {
                action_type: other.to_string(),
            },
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::DoNothing)
    }

    /// Natural-language description the graph can extract entities from.
    pub fn describe(&self) -> String {
        match self {
            Self::CreatePost { content: Some(c) } => format!("published a post: \"{c}\""),
            Self::CreatePost { content: None } => "published a post".into(),
            Self::LikePost { post_id: Some(id) } => format!("liked post #{id}"),
            Self::LikePost { post_id: None } => "liked a post".into(),
            Self::DislikePost { post_id: Some(id) } => format!("disliked post #{id}"),
            Self::DislikePost { post_id: None } => "disliked a post".into(),
            Self::Repost { post_id: Some(id) } => format!("reposted post #{id}"),
            Self::Repost { post_id: None } => "reposted a post".into(),
            Self::QuotePost {
                quoted_id: Some(id),
                content: Some(c),
            } => format!("quoted post #{id} and commented: \"{c}\""),
            Self::QuotePost {
                quoted_id: Some(id),
                content: None,
            } => format!("quoted post #{id}"),
            Self::QuotePost { quoted_id: None, .. } => "quoted a post".into(),
            Self::Follow { target_id: Some(id) } => format!("followed user #{id}"),
            Self::Follow { target_id: None } => "followed a user".into(),
            Self::CreateComment {
                post_id: Some(id),
                content: Some(c),
            } => format!("commented on post #{id}: \"{c}\""),
            Self::CreateComment {
                post_id: None,
                content: Some(c),
            } => format!("commented: \"{c}\""),
            Self::CreateComment {
                post_id: Some(id),
                content: None,
            } => format!("commented on post #{id}"),
            Self::CreateComment {
                post_id: None,
                content: None,
            } => "left a comment".into(),
            Self::LikeComment { comment_id: Some(id) } => format!("liked comment #{id}"),
            Self::LikeComment { comment_id: None } => "liked a comment".into(),
            Self::DislikeComment { comment_id: Some(id) } => format!("disliked comment #{id}"),
            Self::DislikeComment { comment_id: None } => "disliked a comment".into(),
            Self::SearchPosts { query: Some(q) } => format!("searched for \"{q}\""),
            Self::SearchPosts { query: None } => "ran a search".into(),
            Self::SearchUser { query: Some(q) } => format!("searched for user \"{q}\""),
            Self::SearchUser { query: None } => "searched for users".into(),
            Self::Mute { target_id: Some(id) } => format!("muted user #{id}"),
            Self::Mute { target_id: None } => "muted a user".into(),
            Self::DoNothing => "did nothing".into(),
            Self::Other { action_type } => format!("performed {action_type}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentActivity {
    pub platform: String,
    pub agent_id: u64,
    pub agent_name: String,
    pub action: AgentAction,
    pub round: u64,
    pub timestamp: String,
}

/// Raw shape of one line in an actions log.
#[derive(Debug, Deserialize)]
struct ActionLine {
    #[serde(default)]
    event_type: Option<Value>,
    #[serde(default)]
    agent_id: u64,
    #[serde(default)]
    agent_name: String,
    #[serde(default)]
    action_type: String,
    #[serde(default)]
    action_args: Map<String, Value>,
    #[serde(default)]
    round: u64,
    #[serde(default)]
    timestamp: Option<String>,
}

impl AgentActivity {
    /// Parse one JSONL record. Event records (carrying `event_type`) yield `None`.
    pub fn from_json_line(line: &str, platform: &str) -> Result<Option<Self>, serde_json::Error> {
        let raw: ActionLine = serde_json::from_str(line)?;
        if raw.event_type.is_some() {
            return Ok(None);
        }
        Ok(Some(Self {
            platform: platform.to_string(),
            agent_id: raw.agent_id,
            agent_name: raw.agent_name,
            action: AgentAction::from_parts(&raw.action_type, &raw.action_args),
            round: raw.round,
            timestamp: raw
                .timestamp
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
        }))
    }

    /// `"<agent name>: <description>"`, with no simulation framing.
    pub fn to_episode_text(&self) -> String {
        format!("{}: {}", self.agent_name, self.action.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(kind: &str, args: Value) -> AgentAction {
        AgentAction::from_parts(kind, args.as_object().unwrap())
    }

    #[test]
    fn each_kind_has_its_own_description() {
        let cases = [
            (action("CREATE_POST", json!({"content": "Fees are too high"})), "published a post: \"Fees are too high\""),
            (action("CREATE_POST", json!({})), "published a post"),
            (action("LIKE_POST", json!({"post_id": 42})), "liked post #42"),
            (action("DISLIKE_POST", json!({"post_id": "7"})), "disliked post #7"),
            (action("REPOST", json!({})), "reposted a post"),
            (action("QUOTE_POST", json!({"quoted_id": 3, "content": "agreed"})), "quoted post #3 and commented: \"agreed\""),
            (action("QUOTE_POST", json!({"quoted_id": 3})), "quoted post #3"),
            (action("FOLLOW", json!({"user_id": 9})), "followed user #9"),
            (action("FOLLOW", json!({"target_id": "11"})), "followed user #11"),
            (action("CREATE_COMMENT", json!({"post_id": 1, "content": "no way"})), "commented on post #1: \"no way\""),
            (action("CREATE_COMMENT", json!({"content": "no way"})), "commented: \"no way\""),
            (action("CREATE_COMMENT", json!({"post_id": 1})), "commented on post #1"),
            (action("LIKE_COMMENT", json!({"comment_id": 5})), "liked comment #5"),
            (action("DISLIKE_COMMENT", json!({})), "disliked a comment"),
            (action("SEARCH_POSTS", json!({"keyword": "tuition"})), "searched for \"tuition\""),
            (action("SEARCH_USER", json!({"username": "dean"})), "searched for user \"dean\""),
            (action("MUTE", json!({"user_id": 2})), "muted user #2"),
        ];
        for (a, expected) in cases {
            assert_eq!(a.describe(), expected, "{a:?}");
        }
    }

    #[test]
    fn unknown_kind_uses_default_description() {
        let a = action("INTERVIEW", json!({"x": 1}));
        assert_eq!(
            a,
            AgentAction::Other {
                action_type: "INTERVIEW".into()
            }
        );
        assert_eq!(a.describe(), "performed INTERVIEW");
    }

    #[test]
    fn empty_string_args_count_as_missing() {
        assert_eq!(action("LIKE_POST", json!({"post_id": ""})).describe(), "liked a post");
    }

    #[test]
    fn parses_action_line() {
        let line = r#"{"round": 3, "agent_id": 17, "agent_name": "Alice", "action_type": "CREATE_POST",
                       "action_args": {"content": "Walkout at noon"}, "timestamp": "2024-05-01T10:00:00"}"#;
        let activity = AgentActivity::from_json_line(line, "twitter").unwrap().unwrap();
        assert_eq!(activity.agent_id, 17);
        assert_eq!(activity.round, 3);
        assert_eq!(activity.platform, "twitter");
        assert_eq!(
            activity.to_episode_text(),
            "Alice: published a post: \"Walkout at noon\""
        );
    }

    #[test]
    fn event_lines_are_skipped() {
        let line = r#"{"event_type": "round_start", "round": 1}"#;
        assert!(AgentActivity::from_json_line(line, "reddit").unwrap().is_none());
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(AgentActivity::from_json_line("{oops", "reddit").is_err());
    }
}
