use crate::error::{ReconError, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%d.%m.%Y";

lazy_static::lazy_static! {
    static ref DATE_SHAPE: Regex = Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{4}$").unwrap();
}

/// 出荷種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentType {
    /// 最終出荷
    Full,
    /// 分納
    Partial,
}

impl ShipmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentType::Full => "full",
            ShipmentType::Partial => "partial",
        }
    }

    /// 帳票に書く表記
    pub fn label(&self) -> &'static str {
        match self {
            ShipmentType::Full => "Окончательная отгрузка",
            ShipmentType::Partial => "Частичная отгрузка",
        }
    }
}

impl FromStr for ShipmentType {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(ShipmentType::Full),
            "partial" => Ok(ShipmentType::Partial),
            _ => Err(ReconError::InvalidShipmentType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalParams {
    pub shipment_type: ShipmentType,
    /// ДД.ММ.ГГГГ（入力のまま）
    pub shipment_date: String,
    pub shipment_label: String,
}

impl FinalParams {
    pub fn new(shipment_type: ShipmentType, shipment_date: &str) -> Result<Self> {
        let shipment_date = shipment_date.trim();
        parse_shipment_date(shipment_date)?;
        Ok(Self {
            shipment_type,
            shipment_date: shipment_date.to_string(),
            shipment_label: shipment_type.label().to_string(),
        })
    }
}

/// ДД.ММ.ГГГГ 形式で、実在する日付であること
pub fn parse_shipment_date(text: &str) -> Result<NaiveDate> {
    if !DATE_SHAPE.is_match(text) {
        return Err(ReconError::InvalidDateFormat(text.to_string()));
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| ReconError::InvalidDateFormat(text.to_string()))
}
