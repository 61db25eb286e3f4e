//! Natural-language questions over the catalog graph.
//!
//! The registry does not talk to a language model itself. A
//! [`QueryTranslator`] turns a question into Cypher; this module supplies
//! the schema and examples it is prompted with, and cleans the query out
//! of whatever the model wrapped around it. Running the query is up to
//! the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use catalog_core::{DictField, DictListField, ListField, ScalarField};

use crate::error::{RegistryError, Result};

/// Keywords a Cypher line may start with.
const CYPHER_KEYWORDS: [&str; 20] = [
    "MATCH", "RETURN", "WITH", "WHERE", "CREATE", "MERGE", "OPTIONAL", "UNWIND", "CALL", "SET",
    "DELETE", "DETACH", "ORDER", "SKIP", "LIMIT", "REMOVE", "FOREACH", "LOAD", "USING", "UNION",
];

/// Question/query pairs shown to the translator.
pub const CYPHER_EXAMPLES: &[&str] = &[
    "USER INPUT: 'Which data products does RawCustomerData feed into?' \
     QUERY: MATCH (:DataProduct {name: 'RawCustomerData'})-[:FEEDS_INTO]->(d:DataProduct) \
     RETURN d.name",
    "USER INPUT: 'Who owns ProcessedCustomerData?' \
     QUERY: MATCH (:DataProduct {name: 'ProcessedCustomerData'})-[:OWNED_BY]->(o:Owner) \
     RETURN o.name, o.email",
    "USER INPUT: 'Which data products are tagged pii?' \
     QUERY: MATCH (d:DataProduct)-[:HAS_TAG]->(:Tag {name: 'pii'}) RETURN d.name",
    "USER INPUT: 'Which pipelines does Ingest trigger?' \
     QUERY: MATCH (:Pipeline {name: 'Ingest'})-[:TRIGGERS]->(p:Pipeline) RETURN p.name",
    "USER INPUT: 'What changed on RawCustomerData?' \
     QUERY: MATCH (:DataProduct {name: 'RawCustomerData'})-[:HAS_CHANGE_LOG]->(c:ChangeLog) \
     RETURN c.field, c.old_value, c.new_value, c.timestamp ORDER BY c.timestamp",
];

/// Describe the graph's labels and relationships for a translator prompt.
pub fn graph_schema() -> String {
    let scalars: Vec<&str> = ScalarField::ALL.iter().map(|f| f.key()).collect();

    let mut lines = vec![
        "Node properties:".to_string(),
        format!("DataProduct {{id, {}}}", scalars.join(", ")),
        "Pipeline {name, plus any attributes given when first created}".to_string(),
        "ChangeLog {field, old_value, new_value, timestamp}".to_string(),
    ];
    for field in ListField::ALL {
        lines.push(format!("{} {{name}}", field.label()));
    }
    for field in DictField::ALL {
        lines.push(format!("{} {{free-form attributes from `{}`}}", field.label(), field.name()));
    }
    for field in DictListField::ALL {
        if field != DictListField::Pipelines {
            lines.push(format!("{} {{free-form attributes from `{}`}}", field.label(), field.name()));
        }
    }

    lines.push(String::new());
    lines.push("Relationships:".to_string());
    for field in ListField::ALL {
        lines.push(format!("(:DataProduct)-[:{}]->(:{})", field.edge(), field.label()));
    }
    for field in DictField::ALL {
        lines.push(format!("(:DataProduct)-[:{}]->(:{})", field.edge(), field.label()));
    }
    for field in DictListField::ALL {
        lines.push(format!("(:DataProduct)-[:{}]->(:{})", field.edge(), field.label()));
    }
    lines.extend(
        [
            "(:Pipeline)-[:TRIGGERS]->(:Pipeline)",
            "(:Pipeline)-[:PRODUCES]->(:DataProduct)",
            "(:DataProduct)-[:FEEDS_INTO]->(:DataProduct)",
            "(:DataProduct)-[:HAS_CHANGE_LOG]->(:ChangeLog)",
        ]
        .map(String::from),
    );

    lines.join("\n")
}

/// Pull the Cypher query out of a model response.
///
/// Backticks are dropped, then the query starts at the first line opening
/// with a Cypher keyword and runs while lines are non-blank and either open
/// with a keyword or are indented. Without any keyword line the whole
/// response is returned.
pub fn extract_cypher(response: &str) -> String {
    let cleaned = response.replace('`', "");
    let cleaned = cleaned.trim();
    let lines: Vec<&str> = cleaned.lines().collect();

    let Some(start) = lines.iter().position(|line| starts_with_keyword(line)) else {
        return cleaned.to_string();
    };

    let mut query = Vec::new();
    for line in &lines[start..] {
        if line.trim().is_empty() {
            break;
        }
        if starts_with_keyword(line) || line.starts_with("    ") || line.starts_with('\t') {
            query.push(*line);
        } else {
            break;
        }
    }

    query
        .join("\n")
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string()
}

fn starts_with_keyword(line: &str) -> bool {
    let upper = line.trim().to_uppercase();
    CYPHER_KEYWORDS.iter().any(|kw| upper.starts_with(kw))
}

/// What a translator produced for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    /// Raw model output containing the query.
    pub query: String,
    /// Natural-language answer, when the translator also produced one.
    pub answer: Option<String>,
}

/// Turns a question into a graph query.
#[async_trait]
pub trait QueryTranslator: Send + Sync {
    async fn translate(&self, question: &str, schema: &str, examples: &[&str])
        -> Result<Translation>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub question: String,
    pub cypher: String,
    pub answer: Option<String>,
}

pub struct Assistant<T> {
    translator: T,
    schema: String,
}

impl<T: QueryTranslator> Assistant<T> {
    pub fn new(translator: T) -> Self {
        Self {
            translator,
            schema: graph_schema(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Translate a question and extract the query to run.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RegistryError::Validation("question is empty".to_string()));
        }

        let translation = self
            .translator
            .translate(question, &self.schema, CYPHER_EXAMPLES)
            .await?;
        let cypher = extract_cypher(&translation.query);
        if cypher.is_empty() {
            return Err(RegistryError::Translation(
                "translator returned no query".to_string(),
            ));
        }

        tracing::debug!(question, cypher = %cypher, "Question translated");
        Ok(Answer {
            question: question.to_string(),
            cypher,
            answer: translation.answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl QueryTranslator for Canned {
        async fn translate(
            &self,
            _question: &str,
            schema: &str,
            examples: &[&str],
        ) -> Result<Translation> {
            assert!(schema.contains("FEEDS_INTO"));
            assert!(!examples.is_empty());
            Ok(Translation {
                query: self.0.to_string(),
                answer: Some("RawCustomerData feeds ProcessedCustomerData.".to_string()),
            })
        }
    }

    #[test]
    fn test_extract_strips_fences_and_prose() {
        let response = "Here is the query:\n```cypher\nMATCH (d:DataProduct)\n    WHERE d.domain = 'Sales'\nRETURN d.name;\n```\nThis lists sales products.";
        assert_eq!(
            extract_cypher(response),
            "MATCH (d:DataProduct)\n    WHERE d.domain = 'Sales'\nRETURN d.name"
        );
    }

    #[test]
    fn test_extract_stops_at_blank_line() {
        let response = "MATCH (n) RETURN n\n\nMATCH (m) RETURN m";
        assert_eq!(extract_cypher(response), "MATCH (n) RETURN n");
    }

    #[test]
    fn test_extract_stops_at_unindented_prose() {
        let response = "match (n:Tag)\nreturn n.name\nThat returns every tag.";
        assert_eq!(extract_cypher(response), "match (n:Tag)\nreturn n.name");
    }

    #[test]
    fn test_extract_without_keywords_returns_response() {
        assert_eq!(extract_cypher("  `I don't know.`  "), "I don't know.");
    }

    #[test]
    fn test_schema_covers_catalogue() {
        let schema = graph_schema();
        assert!(schema.contains("DataProduct {id, name, type,"));
        assert!(schema.contains("(:DataProduct)-[:HAS_PII]->(:PIIField)"));
        assert!(schema.contains("(:DataProduct)-[:HAS_PIPELINE]->(:Pipeline)"));
        assert!(schema.contains("(:Pipeline)-[:TRIGGERS]->(:Pipeline)"));
    }

    #[tokio::test]
    async fn test_ask_extracts_query() {
        let assistant = Assistant::new(Canned(
            "```\nMATCH (:DataProduct {name: 'RawCustomerData'})-[:FEEDS_INTO]->(d)\nRETURN d.name\n```",
        ));
        let answer = assistant.ask("  What does RawCustomerData feed?  ").await.unwrap();

        assert_eq!(answer.question, "What does RawCustomerData feed?");
        assert!(answer.cypher.starts_with("MATCH"));
        assert!(answer.cypher.ends_with("RETURN d.name"));
        assert!(answer.answer.is_some());
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_question() {
        let assistant = Assistant::new(Canned("MATCH (n) RETURN n"));
        let err = assistant.ask("   ").await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_translation() {
        let assistant = Assistant::new(Canned("```\n```"));
        let err = assistant.ask("Anything?").await.unwrap_err();
        assert!(matches!(err, RegistryError::Translation(_)));
    }
}
