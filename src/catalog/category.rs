//! Categories and sample dimensions.
//!
//! A sample dimension maps the raw integers stored in one band to physical
//! values through an ordered list of categories. A category covering
//! `[lower, upper]` is quantitative when it carries both transfer
//! coefficients; the others (land, clouds, missing data) only have a name and
//! colors.

use rusqlite::params;
use std::hash::{Hash, Hasher};

use super::Catalog;
use crate::colormaps::{colormap::lerp_color, decode_colors, Rgb};
use crate::error::{CovercatError, Result};

const TABLE: &str = "categories";

/// Transfer function from a raw sample to a physical value.
#[derive(Debug, Clone, Copy)]
pub enum Transfer {
    /// `c0 + c1 * value`
    Linear { c0: f64, c1: f64 },
    /// `10^(c0 + c1 * value)`
    Logarithmic { c0: f64, c1: f64 },
}

impl Transfer {
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            Transfer::Linear { c0, c1 } => c0 + c1 * value,
            Transfer::Logarithmic { c0, c1 } => 10f64.powf(c0 + c1 * value),
        }
    }

    fn key(&self) -> (bool, u64, u64) {
        match *self {
            Transfer::Linear { c0, c1 } => (false, c0.to_bits(), c1.to_bits()),
            Transfer::Logarithmic { c0, c1 } => (true, c0.to_bits(), c1.to_bits()),
        }
    }
}

impl PartialEq for Transfer {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Transfer {}

impl Hash for Transfer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// A range of raw values sharing a meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    pub name: String,
    pub lower: i32,
    pub upper: i32,
    pub transfer: Option<Transfer>,
    pub colors: Vec<Rgb>,
}

impl Category {
    pub fn is_quantitative(&self) -> bool {
        self.transfer.is_some()
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower as f64 && value <= self.upper as f64
    }

    /// Color of `value` within this category's palette.
    pub fn color_of(&self, value: f64) -> Option<Rgb> {
        match self.colors.len() {
            0 => None,
            1 => Some(self.colors[0]),
            n => {
                let span = (i64::from(self.upper) - i64::from(self.lower)).max(1) as f64;
                let position =
                    ((value - self.lower as f64) / span).clamp(0.0, 1.0) * (n - 1) as f64;
                let index = position.floor() as usize;
                if index >= n - 1 {
                    Some(self.colors[n - 1])
                } else {
                    Some(lerp_color(
                        self.colors[index],
                        self.colors[index + 1],
                        (position - index as f64) as f32,
                    ))
                }
            }
        }
    }
}

/// Value-to-physical mapping of one band.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleDimension {
    pub band: i64,
    pub units: Option<String>,
    pub categories: Vec<Category>,
}

impl SampleDimension {
    /// Category whose range holds the (rounded) raw value.
    pub fn category_of(&self, value: f32) -> Option<&Category> {
        if !value.is_finite() {
            return None;
        }
        let value = (value as f64).round();
        self.categories.iter().find(|c| c.contains(value))
    }

    /// Physical value of a raw sample; NaN outside quantitative categories.
    pub fn to_physical(&self, value: f32) -> f32 {
        match self.category_of(value).and_then(|c| c.transfer) {
            Some(transfer) => transfer.apply(value as f64) as f32,
            None => f32::NAN,
        }
    }

    /// True if at least one category has colors.
    pub fn has_colors(&self) -> bool {
        self.categories.iter().any(|c| !c.colors.is_empty())
    }

    /// Display color of a raw sample.
    pub fn color_of(&self, value: f32) -> Option<Rgb> {
        self.category_of(value)
            .and_then(|c| c.color_of((value as f64).round()))
    }

    /// Range of physical values reachable from the quantitative categories.
    pub fn physical_range(&self) -> Option<(f64, f64)> {
        self.categories
            .iter()
            .filter_map(|c| {
                let t = c.transfer?;
                let (a, b) = (t.apply(c.lower as f64), t.apply(c.upper as f64));
                Some((a.min(b), a.max(b)))
            })
            .reduce(|(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }
}

/// Reader of the `categories` table.
pub struct CategoryTable<'a> {
    catalog: &'a Catalog,
}

impl<'a> CategoryTable<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Categories of a band, ordered by lower bound.
    pub fn categories(&self, band: i64) -> Result<Vec<Category>> {
        let rows = self.catalog.with_connection(|connection| {
            let mut statement = connection.prepare_cached(self.catalog.query(TABLE))?;
            let rows = statement
                .query_map(params![band], |row| {
                    Ok(CategoryRow {
                        name: row.get(0)?,
                        lower: row.get(1)?,
                        upper: row.get(2)?,
                        c0: row.get(3)?,
                        c1: row.get(4)?,
                        log: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
                        colors: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut categories: Vec<Category> = Vec::with_capacity(rows.len());
        for row in rows {
            if row.lower > row.upper {
                return Err(CovercatError::illegal_record(
                    TABLE,
                    format!(
                        "category \"{}\" has lower bound {} above upper bound {}",
                        row.name, row.lower, row.upper
                    ),
                ));
            }
            if let Some(previous) = categories.last() {
                if row.lower <= previous.upper {
                    return Err(CovercatError::illegal_record(
                        TABLE,
                        format!(
                            "category \"{}\" overlaps \"{}\" in band {}",
                            row.name, previous.name, band
                        ),
                    ));
                }
            }
            let transfer = match (row.c0, row.c1) {
                (Some(c0), Some(c1)) if row.log => Some(Transfer::Logarithmic { c0, c1 }),
                (Some(c0), Some(c1)) => Some(Transfer::Linear { c0, c1 }),
                _ => None,
            };
            let colors = match row.colors.as_deref() {
                Some(spec) if !spec.trim().is_empty() => {
                    decode_colors(spec, self.catalog.palettes(), TABLE)?
                }
                _ => Vec::new(),
            };
            categories.push(Category {
                name: row.name,
                lower: row.lower,
                upper: row.upper,
                transfer,
                colors,
            });
        }
        Ok(categories)
    }
}

struct CategoryRow {
    name: String,
    lower: i32,
    upper: i32,
    c0: Option<f64>,
    c1: Option<f64>,
    log: bool,
    colors: Option<String>,
}
