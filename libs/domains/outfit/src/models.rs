use mongodb::bson::{Bson, Document};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Field on source documents marking them as already embedded
pub const PROCESSED_FIELD: &str = "processed";

// ===== Embeddings =====

/// Supported embedding models.
///
/// Vectors from different models are never comparable; the vector index is
/// built for exactly one of these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum EmbeddingModel {
    #[default]
    #[strum(serialize = "text-embedding-ada-002")]
    #[serde(rename = "text-embedding-ada-002")]
    TextEmbeddingAda002,
    #[strum(serialize = "text-embedding-3-small")]
    #[serde(rename = "text-embedding-3-small")]
    TextEmbedding3Small,
    #[strum(serialize = "text-embedding-3-large")]
    #[serde(rename = "text-embedding-3-large")]
    TextEmbedding3Large,
}

impl EmbeddingModel {
    pub fn model_name(&self) -> &'static str {
        match self {
            EmbeddingModel::TextEmbeddingAda002 => "text-embedding-ada-002",
            EmbeddingModel::TextEmbedding3Small => "text-embedding-3-small",
            EmbeddingModel::TextEmbedding3Large => "text-embedding-3-large",
        }
    }

    pub fn dimension(&self) -> u32 {
        match self {
            EmbeddingModel::TextEmbeddingAda002 => 1536,
            EmbeddingModel::TextEmbedding3Small => 1536,
            EmbeddingModel::TextEmbedding3Large => 3072,
        }
    }
}

/// A single embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmbeddingResult {
    pub values: Vec<f32>,
    pub dimension: u32,
    pub tokens_used: u32,
}

// ===== Extracted products =====

/// One (category, description) pair taken from the vision model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductEntry {
    pub category: String,
    pub description: String,
}

impl ProductEntry {
    pub fn new(category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
        }
    }

    /// Text sent to the embedding model: `"<category>: <description>"`
    pub fn query_text(&self) -> String {
        format!("{}: {}", self.category.trim(), self.description.trim())
    }
}

/// Ordered category → description mapping.
///
/// Serialized as a JSON object; insertion order is kept so recommendation
/// groups come back in the order the model (or the user) listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedProducts {
    entries: Vec<ProductEntry>,
}

impl ExtractedProducts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductEntry> {
        self.entries.iter()
    }

    pub fn get(&self, category: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.category == category)
            .map(|e| e.description.as_str())
    }

    /// Set the description for `category`, keeping its position when it exists
    pub fn insert(&mut self, category: impl Into<String>, description: impl Into<String>) {
        let category = category.into();
        let description = description.into();
        match self.entries.iter_mut().find(|e| e.category == category) {
            Some(entry) => entry.description = description,
            None => self.entries.push(ProductEntry {
                category,
                description,
            }),
        }
    }

    pub fn remove(&mut self, category: &str) -> Option<String> {
        let index = self.entries.iter().position(|e| e.category == category)?;
        Some(self.entries.remove(index).description)
    }

    pub fn into_entries(self) -> Vec<ProductEntry> {
        self.entries
    }

    /// Entries of a JSON object; anything else is an empty mapping
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_json_map(map),
            _ => Self::new(),
        }
    }

    /// Keys are kept as-is; non-string descriptions are rendered as JSON text
    pub fn from_json_map(map: Map<String, Value>) -> Self {
        map.into_iter()
            .map(|(category, value)| {
                let description = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (category, description)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtractedProducts {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut products = ExtractedProducts::new();
        for (category, description) in iter {
            products.insert(category, description);
        }
        products
    }
}

impl Serialize for ExtractedProducts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.category, &entry.description)?;
        }
        map.end()
    }
}

/// Lenient: a non-object deserializes to an empty mapping and non-string
/// descriptions are kept as their JSON text.
impl<'de> Deserialize<'de> for ExtractedProducts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ExtractedProducts::from_json)
    }
}

// ===== Product documents =====

/// A product record as stored in the catalogue collection.
///
/// Catalogue documents are scraped data with a loose schema, so the raw BSON
/// is kept and only the fields the pipeline needs are read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDocument {
    inner: Document,
}

impl ProductDocument {
    pub fn new(inner: Document) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> Option<&Bson> {
        self.inner.get("_id")
    }

    /// `_id` rendered for logs
    pub fn id_string(&self) -> String {
        match self.id() {
            Some(Bson::ObjectId(oid)) => oid.to_hex(),
            Some(Bson::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "<no _id>".to_string(),
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self.inner.get(PROCESSED_FIELD), Some(Bson::Boolean(true)))
    }

    /// Join the selected text fields with single spaces.
    ///
    /// Missing, null and non-scalar fields are skipped; numbers are rendered.
    pub fn embedding_text(&self, fields: &[String]) -> String {
        fields
            .iter()
            .filter_map(|field| match self.inner.get(field) {
                Some(Bson::String(s)) => Some(s.trim().to_string()),
                Some(Bson::Int32(n)) => Some(n.to_string()),
                Some(Bson::Int64(n)) => Some(n.to_string()),
                Some(Bson::Double(n)) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn as_document(&self) -> &Document {
        &self.inner
    }

    pub fn into_document(self) -> Document {
        self.inner
    }
}

// ===== Search =====

/// Price as stored by the scraper: a number or free text such as `"29,99 €"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Price {
    Amount(f64),
    Text(String),
}

/// Optional equality restriction applied inside the vector query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EqualityFilter {
    pub field: String,
    pub value: String,
}

/// Nearest-neighbour query against the catalogue
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub top_k: u32,
    pub filter: Option<EqualityFilter>,
}

impl SearchRequest {
    pub fn new(vector: Vec<f32>, top_k: u32) -> Self {
        Self {
            vector,
            top_k,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: EqualityFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Projection of a product document returned by a similarity search
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub subcategory: Option<String>,
    pub model_id: Option<String>,
    pub image: Option<String>,
    pub price: Option<Price>,
    /// Similarity reported by the index; higher is closer
    pub score: Option<f64>,
}

impl SearchResult {
    /// Read a projected document (`id`, `name`, `subcategory`, `model_id`,
    /// `image`, `price`, `score`). Values of unexpected types become `None`.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.get("id").and_then(bson_to_string),
            name: doc.get("name").and_then(bson_to_string),
            subcategory: doc.get("subcategory").and_then(bson_to_string),
            model_id: doc.get("model_id").and_then(bson_to_string),
            image: doc.get("image").and_then(first_string),
            price: doc.get("price").and_then(bson_to_price),
            score: doc.get("score").and_then(Bson::as_f64),
        }
    }
}

fn bson_to_string(value: &Bson) -> Option<String> {
    match value {
        Bson::String(s) => Some(s.clone()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Image references are either a single URL or a list of URLs
fn first_string(value: &Bson) -> Option<String> {
    match value {
        Bson::Array(items) => items.iter().find_map(bson_to_string),
        other => bson_to_string(other),
    }
}

fn bson_to_price(value: &Bson) -> Option<Price> {
    match value {
        Bson::Double(n) => Some(Price::Amount(*n)),
        Bson::Int32(n) => Some(Price::Amount(f64::from(*n))),
        Bson::Int64(n) => Some(Price::Amount(*n as f64)),
        Bson::Decimal128(d) => d.to_string().parse().ok().map(Price::Amount),
        Bson::String(s) if !s.trim().is_empty() => Some(Price::Text(s.trim().to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId};
    use std::str::FromStr;

    #[test]
    fn test_model_names_and_dimensions() {
        assert_eq!(
            EmbeddingModel::TextEmbeddingAda002.model_name(),
            "text-embedding-ada-002"
        );
        assert_eq!(EmbeddingModel::TextEmbedding3Small.dimension(), 1536);
        assert_eq!(EmbeddingModel::TextEmbedding3Large.dimension(), 3072);
        assert_eq!(
            EmbeddingModel::from_str("text-embedding-3-large").unwrap(),
            EmbeddingModel::TextEmbedding3Large
        );
        assert!(EmbeddingModel::from_str("word2vec").is_err());
    }

    #[test]
    fn test_query_text_joins_category_and_description() {
        let entry = ProductEntry::new("shoes", " red leather sneakers ");
        assert_eq!(entry.query_text(), "shoes: red leather sneakers");
    }

    #[test]
    fn test_extracted_products_keep_insertion_order() {
        let json = r#"{"top": "white linen shirt", "bottom": "navy chinos", "shoes": "loafers"}"#;
        let products: ExtractedProducts = serde_json::from_str(json).unwrap();
        let categories: Vec<_> = products.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(categories, vec!["top", "bottom", "shoes"]);
        assert_eq!(serde_json::to_string(&products).unwrap(), json.replace(", ", ",").replace(": ", ":"));
    }

    #[test]
    fn test_extracted_products_non_object_is_empty() {
        for json in ["[]", "null", "\"hat\"", "3"] {
            let products: ExtractedProducts = serde_json::from_str(json).unwrap();
            assert!(products.is_empty(), "{json}");
        }
    }

    #[test]
    fn test_extracted_products_stringify_non_string_values() {
        let products: ExtractedProducts =
            serde_json::from_str(r#"{"count": 3, "hat": null, "bag": {"color": "red"}}"#).unwrap();
        assert_eq!(products.get("count"), Some("3"));
        assert_eq!(products.get("hat"), Some("null"));
        assert_eq!(products.get("bag"), Some(r#"{"color":"red"}"#));
    }

    #[test]
    fn test_extracted_products_edit() {
        let mut products: ExtractedProducts =
            [("hat", "blue cap"), ("shoes", "sneakers")].into_iter().collect();
        products.insert("hat", "red beanie");
        assert_eq!(products.get("hat"), Some("red beanie"));
        assert_eq!(products.iter().next().unwrap().category, "hat");
        assert_eq!(products.remove("shoes"), Some("sneakers".to_string()));
        assert_eq!(products.len(), 1);
        assert_eq!(products.remove("shoes"), None);
    }

    #[test]
    fn test_product_document_embedding_text() {
        let doc = ProductDocument::new(doc! {
            "_id": ObjectId::new(),
            "name": "Collier Lune",
            "subcategory": "  colliers ",
            "category": "",
            "variation_0_color": Bson::Null,
            "size": 42,
        });
        let fields: Vec<String> = ["name", "subcategory", "category", "variation_0_color", "size", "missing"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(doc.embedding_text(&fields), "Collier Lune colliers 42");
        assert!(!doc.is_processed());
    }

    #[test]
    fn test_product_document_processed_flag() {
        let doc = ProductDocument::new(doc! { "_id": "sku-1", "processed": true });
        assert!(doc.is_processed());
        assert_eq!(doc.id_string(), "sku-1");
    }

    #[test]
    fn test_search_result_from_document() {
        let doc = doc! {
            "id": "abc",
            "name": "Bague Soleil",
            "subcategory": "bagues",
            "model_id": 1234_i64,
            "image": ["https://cdn.example.com/a.jpg", "https://cdn.example.com/b.jpg"],
            "price": "49,90 €",
            "score": 0.92,
        };
        let result = SearchResult::from_document(&doc);
        assert_eq!(result.name.as_deref(), Some("Bague Soleil"));
        assert_eq!(result.model_id.as_deref(), Some("1234"));
        assert_eq!(result.image.as_deref(), Some("https://cdn.example.com/a.jpg"));
        assert_eq!(result.price, Some(Price::Text("49,90 €".to_string())));
        assert_eq!(result.score, Some(0.92));
    }

    #[test]
    fn test_search_result_numeric_price_and_missing_fields() {
        let result = SearchResult::from_document(&doc! { "price": 19, "name": Bson::Null });
        assert_eq!(result.price, Some(Price::Amount(19.0)));
        assert_eq!(result.name, None);
        assert_eq!(result.image, None);
    }
}
