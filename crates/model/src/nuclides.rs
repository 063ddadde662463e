//! Natural isotopic abundances used to expand elements into nuclides.
//!
//! Atom fractions follow the IUPAC representative isotopic compositions, the
//! same table the engine's own tooling ships.

/// Isotopes of one element with their natural atom fractions.
pub type IsotopeTable = &'static [(&'static str, f64)];

const NATURAL_ABUNDANCE: &[(&str, IsotopeTable)] = &[
    ("H", &[("H1", 0.999_844_26), ("H2", 0.000_155_74)]),
    ("He", &[("He3", 0.000_001_96), ("He4", 0.999_998_04)]),
    ("B", &[("B10", 0.1965), ("B11", 0.8035)]),
    ("C", &[("C12", 0.9894), ("C13", 0.0106)]),
    ("N", &[("N14", 0.996_205), ("N15", 0.003_795)]),
    ("O", &[("O16", 0.99757), ("O17", 0.00038), ("O18", 0.00205)]),
    (
        "Fe",
        &[
            ("Fe54", 0.05845),
            ("Fe56", 0.91754),
            ("Fe57", 0.02119),
            ("Fe58", 0.00282),
        ],
    ),
    (
        "Zr",
        &[
            ("Zr90", 0.5145),
            ("Zr91", 0.1122),
            ("Zr92", 0.1715),
            ("Zr94", 0.1738),
            ("Zr96", 0.0280),
        ],
    ),
    (
        "U",
        &[("U234", 0.000_054), ("U235", 0.007_204), ("U238", 0.992_742)],
    ),
];

/// Natural isotopes of `symbol`, or `None` if the element is not tabulated.
pub fn natural_isotopes(symbol: &str) -> Option<IsotopeTable> {
    NATURAL_ABUNDANCE
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, isotopes)| *isotopes)
}
