use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct Greeting {
    #[serde(default)]
    name: Option<String>,
}

/// Entry point called by the platform's Rust runtime wrapper.
pub fn fl_main(body: Value) -> Value {
    let name = serde_json::from_value::<Greeting>(body)
        .ok()
        .and_then(|g| g.name)
        .unwrap_or_else(|| "World".to_string());
    json!({ "payload": format!("Hello {name}!") })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greets_by_name() {
        assert_eq!(
            fl_main(json!({"name": "Build"})),
            json!({"payload": "Hello Build!"})
        );
        assert_eq!(fl_main(json!({})), json!({"payload": "Hello World!"}));
    }
}
