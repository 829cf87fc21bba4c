use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// ── AUTH PAYLOADS ───────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token pair returned by `POST /auth/login` and `POST /auth/refresh-token`.
///
/// The login endpoint may answer 2xx without an access token; callers treat
/// an empty `access_token` as a failed login.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

impl TokenPair {
    pub fn has_access_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .finish()
    }
}

fn mask(token: &str) -> &'static str {
    if token.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<ProductId>,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

// ── PRODUCTS ────────────────────────────────────────────────────

/// Product identity. The upstream API uses integers, but string ids are
/// accepted so nothing here assumes a numeric key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductId {
    Num(i64),
    Text(String),
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductId::Num(n) => write!(f, "{n}"),
            ProductId::Text(s) => f.write_str(s),
        }
    }
}

impl ProductId {
    /// Folds numeric text (`"5"`) into `Num(5)` so ids from URLs, JSON
    /// strings and JSON numbers compare equal.
    pub fn canonical(self) -> Self {
        match self {
            ProductId::Text(s) => ProductId::from(s.as_str()),
            num => num,
        }
    }
}

impl FromStr for ProductId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(n) => ProductId::Num(n),
            Err(_) => ProductId::Text(s.to_string()),
        })
    }
}

impl From<i64> for ProductId {
    fn from(n: i64) -> Self {
        ProductId::Num(n)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| ProductId::Text(s.to_string()))
    }
}

// Numbers sort before text; numbers compare numerically.
impl Ord for ProductId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ProductId::Num(a), ProductId::Num(b)) => a.cmp(b),
            (ProductId::Num(_), ProductId::Text(_)) => Ordering::Less,
            (ProductId::Text(_), ProductId::Num(_)) => Ordering::Greater,
            (ProductId::Text(a), ProductId::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for ProductId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Body of `PUT /products/:id`. Only these three fields are ever sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductUpdate {
    pub title: String,
    pub price: f64,
    pub description: String,
}

impl From<&Product> for ProductUpdate {
    fn from(p: &Product) -> Self {
        Self {
            title: p.title.clone(),
            price: p.price,
            description: p.description.clone(),
        }
    }
}

/// Body of `POST /products`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub title: String,
    pub price: f64,
    pub description: String,
    pub category_id: i64,
    pub images: Vec<String>,
}

/// Returns true when `price` is a usable product price: finite and not negative.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price >= 0.0
}
