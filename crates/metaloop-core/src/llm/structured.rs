//! Schema-constrained completions.
//!
//! The request carries a JSON schema derived from the target type. A reply
//! that does not deserialize into that type is a transport failure
//! (`LlmError::SchemaViolation`), never a validation failure.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use metaloop_types::llm::{
    CompletionRequest, LlmError, OutputConfig, add_additional_properties_false,
};

use super::box_provider::BoxLlmProvider;

/// Build a strict `OutputConfig` for `T`.
pub fn output_config_for<T: JsonSchema>(name: &str) -> OutputConfig {
    let mut schema = serde_json::Value::from(schemars::schema_for!(T));
    add_additional_properties_false(&mut schema);
    OutputConfig::json_schema(name, schema)
}

/// Send `request` constrained to `T`'s schema and parse the reply.
pub async fn complete_structured<T>(
    provider: &BoxLlmProvider,
    mut request: CompletionRequest,
    schema_name: &str,
) -> Result<T, LlmError>
where
    T: DeserializeOwned + JsonSchema,
{
    request.output_config = Some(output_config_for::<T>(schema_name));
    let response = provider.complete(&request).await?;
    parse_structured(&response.content, schema_name)
}

/// Parse a structured reply, tolerating a surrounding markdown code fence.
pub fn parse_structured<T: DeserializeOwned>(content: &str, schema_name: &str) -> Result<T, LlmError> {
    let body = strip_code_fence(content.trim());
    serde_json::from_str(body).map_err(|e| LlmError::SchemaViolation {
        schema: schema_name.to_string(),
        message: format!(
            "{e}; content preview: {}",
            body.chars().take(200).collect::<String>()
        ),
    })
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaloop_types::generation::GeneratedText;

    #[test]
    fn test_parse_plain_json() {
        let parsed: GeneratedText =
            parse_structured(r#"{"title": "T", "description": "D"}"#, "GeneratedText").unwrap();
        assert_eq!(parsed.title, "T");
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "```json\n{\"title\": \"T\", \"description\": \"D\"}\n```";
        let parsed: GeneratedText = parse_structured(content, "GeneratedText").unwrap();
        assert_eq!(parsed.description, "D");
    }

    #[test]
    fn test_missing_field_is_schema_violation() {
        let err = parse_structured::<GeneratedText>(r#"{"title": "T"}"#, "GeneratedText").unwrap_err();
        match err {
            LlmError::SchemaViolation { schema, .. } => assert_eq!(schema, "GeneratedText"),
            other => panic!("expected SchemaViolation, got {other}"),
        }
    }

    #[test]
    fn test_output_config_is_strict_and_closed() {
        let config = output_config_for::<GeneratedText>("GeneratedText");
        assert_eq!(config.format.type_field, "json_schema");
        assert_eq!(config.format.json_schema.strict, Some(true));
        assert_eq!(config.format.json_schema.schema["additionalProperties"], false);
    }
}
