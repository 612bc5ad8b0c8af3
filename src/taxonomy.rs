//! Static pest class taxonomy
//!
//! Maps detector class ids to pest names, display colors and mitigation
//! recommendations. All tables are immutable and process-wide.

use crate::error::AnalysisError;
use serde::{Serialize, Serializer};
use std::fmt;

/// One of the ten pest classes the detector is trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PestClass {
    Lagarta,
    Pulgao,
    Percevejo,
    MoscaBranca,
    Trips,
    Acaro,
    Cochonilha,
    Cigarrinha,
    Broca,
    Vaquinha,
}

impl PestClass {
    pub const ALL: [PestClass; 10] = [
        PestClass::Lagarta,
        PestClass::Pulgao,
        PestClass::Percevejo,
        PestClass::MoscaBranca,
        PestClass::Trips,
        PestClass::Acaro,
        PestClass::Cochonilha,
        PestClass::Cigarrinha,
        PestClass::Broca,
        PestClass::Vaquinha,
    ];

    /// Resolve a detector class id
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Resolve a label name as produced by `name()`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|class| class.name() == name)
    }

    pub fn id(&self) -> u32 {
        *self as u32
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lagarta => "lagarta",
            Self::Pulgao => "pulgão",
            Self::Percevejo => "percevejo",
            Self::MoscaBranca => "mosca_branca",
            Self::Trips => "trips",
            Self::Acaro => "ácaro",
            Self::Cochonilha => "cochonilha",
            Self::Cigarrinha => "cigarrinha",
            Self::Broca => "broca",
            Self::Vaquinha => "vaquinha",
        }
    }

    /// Display color (RGB) used by the renderer
    pub fn color(&self) -> [u8; 3] {
        match self {
            Self::Lagarta => [255, 0, 0],
            Self::Pulgao => [0, 255, 0],
            Self::Percevejo => [0, 0, 255],
            Self::MoscaBranca => [255, 255, 0],
            Self::Trips => [255, 0, 255],
            Self::Acaro => [0, 255, 255],
            Self::Cochonilha => [128, 0, 0],
            Self::Cigarrinha => [0, 128, 0],
            Self::Broca => [0, 0, 128],
            Self::Vaquinha => [128, 128, 0],
        }
    }

    /// Mitigation actions for this class
    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            Self::Lagarta => &[
                "Aplicar Bacillus thuringiensis (Bt) nas áreas afetadas",
                "Liberar parasitoides como Trichogramma",
                "Monitorar folhas jovens diariamente em busca de posturas",
            ],
            Self::Pulgao => &[
                "Favorecer inimigos naturais como joaninhas e crisopídeos",
                "Aplicar óleo de neem ou sabão inseticida",
                "Reduzir adubação nitrogenada excessiva",
            ],
            Self::Percevejo => &[
                "Realizar pano de batida para estimar a população",
                "Liberar parasitoides de ovos (Telenomus podisi)",
                "Controlar plantas daninhas hospedeiras nas bordas",
            ],
            Self::MoscaBranca => &[
                "Instalar armadilhas adesivas amarelas",
                "Aplicar fungos entomopatogênicos (Beauveria bassiana)",
                "Eliminar restos culturais após a colheita",
            ],
            Self::Trips => &[
                "Instalar armadilhas adesivas azuis",
                "Manter irrigação adequada para reduzir estresse hídrico",
                "Liberar ácaros predadores (Amblyseius)",
            ],
            Self::Acaro => &[
                "Aumentar a umidade do ambiente",
                "Liberar ácaros predadores (Phytoseiulus persimilis)",
                "Aplicar acaricida seletivo apenas em focos",
            ],
            Self::Cochonilha => &[
                "Podar e destruir ramos muito infestados",
                "Aplicar óleo mineral ou vegetal",
                "Favorecer joaninhas predadoras",
            ],
            Self::Cigarrinha => &[
                "Eliminar plantas voluntárias e hospedeiras",
                "Aplicar Metarhizium anisopliae",
                "Ajustar a época de plantio para evitar picos populacionais",
            ],
            Self::Broca => &[
                "Remover e destruir partes atacadas da planta",
                "Liberar Cotesia flavipes",
                "Usar armadilhas de feromônio para monitoramento",
            ],
            Self::Vaquinha => &[
                "Utilizar iscas atrativas com cucurbitáceas",
                "Fazer rotação de culturas para reduzir larvas no solo",
                "Aplicar controle biológico com nematoides entomopatogênicos",
            ],
        }
    }
}

impl fmt::Display for PestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for PestClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Look up mitigation actions by label name
pub fn recommendations(label: &str) -> Result<&'static [&'static str], AnalysisError> {
    PestClass::from_name(label)
        .map(|class| class.recommendations())
        .ok_or_else(|| AnalysisError::UnknownLabel(label.to_string()))
}
