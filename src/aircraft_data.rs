use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coerce::{Coerced, classify_integer, classify_real, coerce_string};

/// Number of positional cells in an `ACD_Data` row
pub const COLUMN_COUNT: usize = 41;

/// Natural key of an aircraft characteristics record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AircraftKey {
    pub icao_code: String,
    pub faa_designator: String,
}

impl AircraftKey {
    pub fn new(icao_code: impl Into<String>, faa_designator: impl Into<String>) -> Self {
        Self {
            icao_code: icao_code.into(),
            faa_designator: faa_designator.into(),
        }
    }
}

impl fmt::Display for AircraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.icao_code, self.faa_designator)
    }
}

/// One row of the FAA Aircraft Characteristics Database.
///
/// Categorical columns use an empty string for "unknown"; numeric columns are
/// `None` when the source cell was blank, `N/A`, or unparseable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AircraftRecord {
    pub icao_code: String,                                   // 0
    pub faa_designator: String,                              // 1
    pub manufacturer: String,                                // 2
    pub model_faa: String,                                   // 3
    pub model_bada: String,                                  // 4
    pub physical_class_engine: String,                       // 5
    pub num_engines: Option<i32>,                            // 6
    pub aac: String,                                         // 7
    pub aac_minimum: String,                                 // 8
    pub aac_maximum: String,                                 // 9
    pub adg: String,                                         // 10
    pub tdg: String,                                         // 11
    pub approach_speed_knot: Option<i32>,                    // 12
    pub approach_speed_minimum_knot: Option<i32>,            // 13
    pub approach_speed_maximum_knot: Option<i32>,            // 14
    pub wingspan_ft_without_winglets_sharklets: Option<f64>, // 15
    pub wingspan_ft_with_winglets_sharklets: Option<f64>,    // 16
    pub length_ft: Option<f64>,                              // 17
    pub tail_height_at_oew_ft: Option<f64>,                  // 18
    pub wheelbase_ft: Option<f64>,                           // 19
    pub cockpit_to_main_gear_ft: Option<f64>,                // 20
    pub main_gear_width_ft: Option<f64>,                     // 21
    pub mtow_lb: Option<i32>,                                // 22
    pub malw_lb: Option<i32>,                                // 23
    pub main_gear_config: String,                            // 24
    pub icao_wtc: String,                                    // 25
    pub parking_area_ft2: Option<f64>,                       // 26
    pub class: String,                                       // 27
    pub faa_weight: String,                                  // 28
    pub cwt: String,                                         // 29
    pub one_half_wake_category: String,                      // 30
    pub two_wake_category_appx_a: String,                    // 31
    pub two_wake_category_appx_b: String,                    // 32
    pub rotor_diameter_ft: Option<f64>,                      // 33
    pub srs: String,                                         // 34
    pub lahso: String,                                       // 35
    pub faa_registry: String,                                // 36
    pub registration_count: Option<i32>,                     // 37
    pub tmfs_operations_fy24: Option<i32>,                   // 38
    pub remarks: String,                                     // 39
    pub last_update: String,                                 // 40
}

/// A parsed row plus the number of numeric cells that had content but did not parse
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub record: AircraftRecord,
    pub unparseable_cells: usize,
}

/// Positional view over a row; positions past the end read as empty cells.
struct RowCells<'a, S> {
    cells: &'a [S],
    unparseable: usize,
}

impl<'a, S: AsRef<str>> RowCells<'a, S> {
    fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(|c| c.as_ref()).unwrap_or("")
    }

    fn string(&self, index: usize) -> String {
        coerce_string(self.cell(index))
    }

    fn int(&mut self, index: usize) -> Option<i32> {
        self.track(classify_integer(self.cell(index)))
    }

    fn float(&mut self, index: usize) -> Option<f64> {
        self.track(classify_real(self.cell(index)))
    }

    fn track<T>(&mut self, coerced: Coerced<T>) -> Option<T> {
        if coerced.is_unparseable() {
            self.unparseable += 1;
        }
        coerced.value()
    }
}

impl AircraftRecord {
    /// Map a worksheet row (header already skipped) onto a record. Never fails.
    pub fn from_row<S: AsRef<str>>(cells: &[S]) -> Self {
        parse_row_with_diagnostics(cells).record
    }

    pub fn key(&self) -> AircraftKey {
        AircraftKey::new(self.icao_code.clone(), self.faa_designator.clone())
    }
}

/// Same as [`AircraftRecord::from_row`], also counting unparseable numeric cells
pub fn parse_row_with_diagnostics<S: AsRef<str>>(cells: &[S]) -> ParsedRow {
    let mut row = RowCells {
        cells,
        unparseable: 0,
    };

    let record = AircraftRecord {
        icao_code: row.string(0),
        faa_designator: row.string(1),
        manufacturer: row.string(2),
        model_faa: row.string(3),
        model_bada: row.string(4),
        physical_class_engine: row.string(5),
        num_engines: row.int(6),
        aac: row.string(7),
        aac_minimum: row.string(8),
        aac_maximum: row.string(9),
        adg: row.string(10),
        tdg: row.string(11),
        approach_speed_knot: row.int(12),
        approach_speed_minimum_knot: row.int(13),
        approach_speed_maximum_knot: row.int(14),
        wingspan_ft_without_winglets_sharklets: row.float(15),
        wingspan_ft_with_winglets_sharklets: row.float(16),
        length_ft: row.float(17),
        tail_height_at_oew_ft: row.float(18),
        wheelbase_ft: row.float(19),
        cockpit_to_main_gear_ft: row.float(20),
        main_gear_width_ft: row.float(21),
        mtow_lb: row.int(22),
        malw_lb: row.int(23),
        main_gear_config: row.string(24),
        icao_wtc: row.string(25),
        parking_area_ft2: row.float(26),
        class: row.string(27),
        faa_weight: row.string(28),
        cwt: row.string(29),
        one_half_wake_category: row.string(30),
        two_wake_category_appx_a: row.string(31),
        two_wake_category_appx_b: row.string(32),
        rotor_diameter_ft: row.float(33),
        srs: row.string(34),
        lahso: row.string(35),
        faa_registry: row.string(36),
        registration_count: row.int(37),
        tmfs_operations_fy24: row.int(38),
        remarks: row.string(39),
        last_update: row.string(40),
    };

    ParsedRow {
        record,
        unparseable_cells: row.unparseable,
    }
}

/// A record as persisted, with its surrogate id and audit timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAircraft {
    pub id: i32,
    #[serde(flatten)]
    pub record: AircraftRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredAircraft {
    pub fn key(&self) -> AircraftKey {
        self.record.key()
    }
}

// Diesel database models for aircraft_data table
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::aircraft_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AircraftDataModel {
    pub id: i32,
    pub icao_code: String,
    pub faa_designator: String,
    pub manufacturer: String,
    pub model_faa: String,
    pub model_bada: String,
    pub physical_class_engine: String,
    pub num_engines: Option<i32>,
    pub aac: String,
    pub aac_minimum: String,
    pub aac_maximum: String,
    pub adg: String,
    pub tdg: String,
    pub approach_speed_knot: Option<i32>,
    pub approach_speed_minimum_knot: Option<i32>,
    pub approach_speed_maximum_knot: Option<i32>,
    pub wingspan_ft_without_winglets_sharklets: Option<f64>,
    pub wingspan_ft_with_winglets_sharklets: Option<f64>,
    pub length_ft: Option<f64>,
    pub tail_height_at_oew_ft: Option<f64>,
    pub wheelbase_ft: Option<f64>,
    pub cockpit_to_main_gear_ft: Option<f64>,
    pub main_gear_width_ft: Option<f64>,
    pub mtow_lb: Option<i32>,
    pub malw_lb: Option<i32>,
    pub main_gear_config: String,
    pub icao_wtc: String,
    pub parking_area_ft2: Option<f64>,
    pub class: String,
    pub faa_weight: String,
    pub cwt: String,
    pub one_half_wake_category: String,
    pub two_wake_category_appx_a: String,
    pub two_wake_category_appx_b: String,
    pub rotor_diameter_ft: Option<f64>,
    pub srs: String,
    pub lahso: String,
    pub faa_registry: String,
    pub registration_count: Option<i32>,
    pub tmfs_operations_fy24: Option<i32>,
    pub remarks: String,
    pub last_update: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Insertable model (id and timestamps are database-generated)
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::aircraft_data, check_for_backend(diesel::pg::Pg))]
pub struct NewAircraftData {
    pub icao_code: String,
    pub faa_designator: String,
    pub manufacturer: String,
    pub model_faa: String,
    pub model_bada: String,
    pub physical_class_engine: String,
    pub num_engines: Option<i32>,
    pub aac: String,
    pub aac_minimum: String,
    pub aac_maximum: String,
    pub adg: String,
    pub tdg: String,
    pub approach_speed_knot: Option<i32>,
    pub approach_speed_minimum_knot: Option<i32>,
    pub approach_speed_maximum_knot: Option<i32>,
    pub wingspan_ft_without_winglets_sharklets: Option<f64>,
    pub wingspan_ft_with_winglets_sharklets: Option<f64>,
    pub length_ft: Option<f64>,
    pub tail_height_at_oew_ft: Option<f64>,
    pub wheelbase_ft: Option<f64>,
    pub cockpit_to_main_gear_ft: Option<f64>,
    pub main_gear_width_ft: Option<f64>,
    pub mtow_lb: Option<i32>,
    pub malw_lb: Option<i32>,
    pub main_gear_config: String,
    pub icao_wtc: String,
    pub parking_area_ft2: Option<f64>,
    pub class: String,
    pub faa_weight: String,
    pub cwt: String,
    pub one_half_wake_category: String,
    pub two_wake_category_appx_a: String,
    pub two_wake_category_appx_b: String,
    pub rotor_diameter_ft: Option<f64>,
    pub srs: String,
    pub lahso: String,
    pub faa_registry: String,
    pub registration_count: Option<i32>,
    pub tmfs_operations_fy24: Option<i32>,
    pub remarks: String,
    pub last_update: String,
}

impl From<AircraftRecord> for NewAircraftData {
    fn from(r: AircraftRecord) -> Self {
        Self {
            icao_code: r.icao_code,
            faa_designator: r.faa_designator,
            manufacturer: r.manufacturer,
            model_faa: r.model_faa,
            model_bada: r.model_bada,
            physical_class_engine: r.physical_class_engine,
            num_engines: r.num_engines,
            aac: r.aac,
            aac_minimum: r.aac_minimum,
            aac_maximum: r.aac_maximum,
            adg: r.adg,
            tdg: r.tdg,
            approach_speed_knot: r.approach_speed_knot,
            approach_speed_minimum_knot: r.approach_speed_minimum_knot,
            approach_speed_maximum_knot: r.approach_speed_maximum_knot,
            wingspan_ft_without_winglets_sharklets: r.wingspan_ft_without_winglets_sharklets,
            wingspan_ft_with_winglets_sharklets: r.wingspan_ft_with_winglets_sharklets,
            length_ft: r.length_ft,
            tail_height_at_oew_ft: r.tail_height_at_oew_ft,
            wheelbase_ft: r.wheelbase_ft,
            cockpit_to_main_gear_ft: r.cockpit_to_main_gear_ft,
            main_gear_width_ft: r.main_gear_width_ft,
            mtow_lb: r.mtow_lb,
            malw_lb: r.malw_lb,
            main_gear_config: r.main_gear_config,
            icao_wtc: r.icao_wtc,
            parking_area_ft2: r.parking_area_ft2,
            class: r.class,
            faa_weight: r.faa_weight,
            cwt: r.cwt,
            one_half_wake_category: r.one_half_wake_category,
            two_wake_category_appx_a: r.two_wake_category_appx_a,
            two_wake_category_appx_b: r.two_wake_category_appx_b,
            rotor_diameter_ft: r.rotor_diameter_ft,
            srs: r.srs,
            lahso: r.lahso,
            faa_registry: r.faa_registry,
            registration_count: r.registration_count,
            tmfs_operations_fy24: r.tmfs_operations_fy24,
            remarks: r.remarks,
            last_update: r.last_update,
        }
    }
}

impl From<AircraftDataModel> for StoredAircraft {
    fn from(m: AircraftDataModel) -> Self {
        Self {
            id: m.id,
            record: AircraftRecord {
                icao_code: m.icao_code,
                faa_designator: m.faa_designator,
                manufacturer: m.manufacturer,
                model_faa: m.model_faa,
                model_bada: m.model_bada,
                physical_class_engine: m.physical_class_engine,
                num_engines: m.num_engines,
                aac: m.aac,
                aac_minimum: m.aac_minimum,
                aac_maximum: m.aac_maximum,
                adg: m.adg,
                tdg: m.tdg,
                approach_speed_knot: m.approach_speed_knot,
                approach_speed_minimum_knot: m.approach_speed_minimum_knot,
                approach_speed_maximum_knot: m.approach_speed_maximum_knot,
                wingspan_ft_without_winglets_sharklets: m.wingspan_ft_without_winglets_sharklets,
                wingspan_ft_with_winglets_sharklets: m.wingspan_ft_with_winglets_sharklets,
                length_ft: m.length_ft,
                tail_height_at_oew_ft: m.tail_height_at_oew_ft,
                wheelbase_ft: m.wheelbase_ft,
                cockpit_to_main_gear_ft: m.cockpit_to_main_gear_ft,
                main_gear_width_ft: m.main_gear_width_ft,
                mtow_lb: m.mtow_lb,
                malw_lb: m.malw_lb,
                main_gear_config: m.main_gear_config,
                icao_wtc: m.icao_wtc,
                parking_area_ft2: m.parking_area_ft2,
                class: m.class,
                faa_weight: m.faa_weight,
                cwt: m.cwt,
                one_half_wake_category: m.one_half_wake_category,
                two_wake_category_appx_a: m.two_wake_category_appx_a,
                two_wake_category_appx_b: m.two_wake_category_appx_b,
                rotor_diameter_ft: m.rotor_diameter_ft,
                srs: m.srs,
                lahso: m.lahso,
                faa_registry: m.faa_registry,
                registration_count: m.registration_count,
                tmfs_operations_fy24: m.tmfs_operations_fy24,
                remarks: m.remarks,
                last_update: m.last_update,
            },
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
