use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDto {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl PropertyDto {
    pub fn new(name: &str, value: &str) -> Self {
        PropertyDto {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertiesDto {
    #[serde(default)]
    pub property: Vec<PropertyDto>,
}

/// Parameter list of a build configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParametersDto {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub property: Vec<PropertyDto>,
}

impl ParametersDto {
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let property: Vec<PropertyDto> = names
            .into_iter()
            .map(|n| PropertyDto::new(n.as_ref(), ""))
            .collect();
        ParametersDto {
            count: Some(property.len() as u32),
            property,
        }
    }

    /// Parameter count, preferring the server-reported value.
    pub fn effective_count(&self) -> u32 {
        self.count.unwrap_or(self.property.len() as u32)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.property
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}
