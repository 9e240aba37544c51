/// Relational engine dialects understood by the reader and the type mapper.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database dialect enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
    Sqlite,
}

impl Dialect {
    /// Get the dialect as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Check if this is MySQL or MariaDB (similar syntax)
    pub fn is_mysql_like(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Schema name used when none is configured
    pub fn default_schema(&self) -> &'static str {
        match self {
            Dialect::Postgres => "public",
            Dialect::MySql => "",
            Dialect::Sqlite => "main",
        }
    }

    /// Detect dialect from a connection URL scheme
    ///
    /// # Examples
    /// ```
    /// use schemagen::Dialect;
    ///
    /// assert_eq!(Dialect::from_url("postgres://localhost/shop"), Some(Dialect::Postgres));
    /// assert_eq!(Dialect::from_url("mysql://localhost/shop"), Some(Dialect::MySql));
    /// assert_eq!(Dialect::from_url("sqlite://shop.db"), Some(Dialect::Sqlite));
    /// assert_eq!(Dialect::from_url("redis://localhost"), None);
    /// ```
    pub fn from_url(url: &str) -> Option<Dialect> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Dialect::Postgres)
        } else if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Some(Dialect::MySql)
        } else if url.starts_with("sqlite://") || url.ends_with(".db") || url.ends_with(".sqlite") {
            Some(Dialect::Sqlite)
        } else {
            None
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(format!(
                "Unsupported database dialect: '{}'. Supported dialects: postgres, mysql, mariadb, sqlite",
                other
            )),
        }
    }
}
