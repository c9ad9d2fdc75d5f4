//! Data-source availability snapshot.

use serde::{Deserialize, Serialize};

/// Availability of the per-module backend APIs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleApis {
    pub guardian: bool,
    pub hunter: bool,
    pub harvestpro: bool,
}

impl ModuleApis {
    /// True when at least one module can serve live data.
    pub fn any(&self) -> bool {
        self.guardian || self.hunter || self.harvestpro
    }
}

/// Result of one validation pass over every data source.
///
/// `overall` is not stored; see [`DataSourceStatus::overall`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceStatus {
    pub gas_oracle: bool,
    #[serde(rename = "coreAPI")]
    pub core_api: bool,
    #[serde(rename = "moduleAPIs")]
    pub module_apis: ModuleApis,
}

impl DataSourceStatus {
    /// Every source unavailable; the state before any probe has run.
    pub const fn unavailable() -> Self {
        Self {
            gas_oracle: false,
            core_api: false,
            module_apis: ModuleApis {
                guardian: false,
                hunter: false,
                harvestpro: false,
            },
        }
    }

    /// Live data needs gas prices, the core API and at least one module.
    pub fn overall(&self) -> bool {
        self.gas_oracle && self.core_api && self.module_apis.any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(gas: bool, core: bool, g: bool, h: bool, hp: bool) -> DataSourceStatus {
        DataSourceStatus {
            gas_oracle: gas,
            core_api: core,
            module_apis: ModuleApis {
                guardian: g,
                hunter: h,
                harvestpro: hp,
            },
        }
    }

    #[test]
    fn overall_matches_formula_for_every_combination() {
        for bits in 0u8..32 {
            let b = |i: u8| bits & (1 << i) != 0;
            let s = status(b(0), b(1), b(2), b(3), b(4));
            let expected = b(0) && b(1) && (b(2) || b(3) || b(4));
            assert_eq!(s.overall(), expected, "bits={bits:05b}");
        }
    }

    #[test]
    fn single_module_is_enough() {
        assert!(status(true, true, false, false, true).overall());
        assert!(!status(true, false, true, true, true).overall());
    }

    #[test]
    fn serializes_with_dashboard_field_names() {
        let json = serde_json::to_value(status(true, false, true, false, false)).unwrap();
        assert_eq!(json["gasOracle"], true);
        assert_eq!(json["coreAPI"], false);
        assert_eq!(json["moduleAPIs"]["guardian"], true);
    }
}
