/// Service configuration loaded from environment variables, with defaults
/// for the marketplace's standard order settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Flat fee added to every order's final amount.
    pub delivery_fee: f64,
    /// Minimum order amount advertised through `/api/order/settings`.
    pub min_order_amount: f64,
    /// Maximum number of distinct lines in a cart.
    pub max_cart_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            delivery_fee: std::env::var("DELIVERY_FEE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.delivery_fee),
            min_order_amount: std::env::var("MIN_ORDER_AMOUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_order_amount),
            max_cart_size: std::env::var("MAX_CART_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_cart_size),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            delivery_fee: 500.0,
            min_order_amount: 1000.0,
            max_cart_size: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.delivery_fee, 500.0);
        assert_eq!(config.max_cart_size, 20);
    }

    #[test]
    fn addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
