#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
)]
pub enum Model {
    #[strum(to_string = "claude-3-5-sonnet-20240620")]
    Claude35Sonnet,
    #[strum(to_string = "claude-3-opus-20240229")]
    Claude3Opus,
    #[strum(to_string = "claude-3-sonnet-20240229")]
    Claude3Sonnet,
    #[strum(to_string = "claude-3-haiku-20240307")]
    Claude3Haiku,
    #[strum(to_string = "claude-2.1")]
    Claude21,
    #[strum(to_string = "claude-2.0")]
    Claude20,
    #[strum(to_string = "claude-instant-1.2")]
    ClaudeInstant12,
}

impl From<Model> for String {
    fn from(model: Model) -> Self {
        model.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn model_ids_round_trip() {
        assert_eq!(Model::Claude35Sonnet.to_string(), "claude-3-5-sonnet-20240620");
        assert_eq!(Model::from_str("claude-3-haiku-20240307").unwrap(), Model::Claude3Haiku);
        let id: &'static str = Model::Claude21.into();
        assert_eq!(id, "claude-2.1");
    }
}
