use serde::{Deserialize, Serialize};

/// One launch argument as found in runtime descriptors: either a bare
/// token or a rule-gated group evaluated at launch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Plain(String),
    Ruled {
        #[serde(default)]
        rules: Vec<serde_json::Value>,
        value: ArgumentValue,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Single(String),
    Many(Vec<String>),
}

impl From<&str> for Argument {
    fn from(token: &str) -> Self {
        Argument::Plain(token.to_string())
    }
}

/// Ordered jvm and game arguments. Merging only ever appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentBlock {
    #[serde(default)]
    pub jvm: Vec<Argument>,
    #[serde(default)]
    pub game: Vec<Argument>,
}

impl ArgumentBlock {
    pub fn append(&mut self, other: &ArgumentBlock) {
        self.jvm.extend(other.jvm.iter().cloned());
        self.game.extend(other.game.iter().cloned());
    }

    /// Append whitespace-separated tokens to the game arguments.
    pub fn append_game_tokens(&mut self, raw: &str) {
        self.game
            .extend(raw.split_whitespace().map(Argument::from));
    }

    pub fn is_empty(&self) -> bool {
        self.jvm.is_empty() && self.game.is_empty()
    }
}
