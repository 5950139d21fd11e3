use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDto {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Agents the server lists by default: connected and authorized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentsDto {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub agent: Vec<AgentDto>,
}

impl AgentsDto {
    pub fn len(&self) -> usize {
        self.count.map(|c| c as usize).unwrap_or(self.agent.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
