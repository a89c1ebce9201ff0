use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "listing_sorter";
const ENV_PREFIX: &str = "LISTINGS";

pub const DEFAULT_MIN_PRICE: f64 = 200.0;
pub const DEFAULT_MAX_PRICE: f64 = 1000.0;
pub const DEFAULT_MIN_SURFACE: f64 = 25.0;

/// Acceptance bounds. Price range is inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub min_price: f64,
    pub max_price: f64,
    pub min_surface: f64,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            min_price: DEFAULT_MIN_PRICE,
            max_price: DEFAULT_MAX_PRICE,
            min_surface: DEFAULT_MIN_SURFACE,
        }
    }
}

impl Criteria {
    /// Defaults, then `listing_sorter.toml` if present, then `LISTINGS_*` env vars.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("min_price", DEFAULT_MIN_PRICE)?
            .set_default("max_price", DEFAULT_MAX_PRICE)?
            .set_default("min_surface", DEFAULT_MIN_SURFACE)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        let criteria: Criteria = settings.try_deserialize()?;
        criteria.validate()?;
        Ok(criteria)
    }

    pub fn with_overrides(
        mut self,
        min_price: Option<f64>,
        max_price: Option<f64>,
        min_surface: Option<f64>,
    ) -> Result<Self> {
        if let Some(v) = min_price {
            self.min_price = v;
        }
        if let Some(v) = max_price {
            self.max_price = v;
        }
        if let Some(v) = min_surface {
            self.min_surface = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let bounds = [self.min_price, self.max_price, self.min_surface];
        if bounds.iter().any(|b| !b.is_finite() || *b < 0.0) {
            bail!("criteria bounds must be finite and non-negative: {:?}", self);
        }
        if self.min_price > self.max_price {
            bail!(
                "min price {} is above max price {}",
                self.min_price,
                self.max_price
            );
        }
        Ok(())
    }

    pub fn price_in_range(&self, price: f64) -> bool {
        (self.min_price..=self.max_price).contains(&price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = Criteria::default();
        assert!(c.validate().is_ok());
        assert!(c.price_in_range(200.0));
        assert!(c.price_in_range(1000.0));
        assert!(!c.price_in_range(1000.01));
        assert!(!c.price_in_range(199.99));
    }

    #[test]
    fn overrides_apply_and_validate() {
        let c = Criteria::default()
            .with_overrides(None, Some(800.0), Some(30.0))
            .unwrap();
        assert_eq!(c.max_price, 800.0);
        assert_eq!(c.min_surface, 30.0);
        assert_eq!(c.min_price, DEFAULT_MIN_PRICE);

        assert!(Criteria::default().with_overrides(Some(900.0), Some(500.0), None).is_err());
        assert!(Criteria::default().with_overrides(None, None, Some(-1.0)).is_err());
    }
}
