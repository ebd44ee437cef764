//! Static content for the public pages. Shapes match what the SPA
//! renders; the values are placeholder copy until the editorial data
//! lands.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub year: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardMember {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub expertise: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteFeature {
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicAffairsItem {
    pub title: &'static str,
    pub category: &'static str,
    pub date: &'static str,
    pub summary: &'static str,
}

const TIMELINE: &[TimelineEvent] = &[
    TimelineEvent {
        year: "1820",
        title: "建造",
        description: "始建於清代，作為地方行政與聚會場所。",
        icon: "mdi-home",
        color: "primary",
    },
    TimelineEvent {
        year: "1985",
        title: "列為古蹟",
        description: "正式列為歷史古蹟，納入法定保護。",
        icon: "mdi-shield-star",
        color: "info",
    },
    TimelineEvent {
        year: "2000",
        title: "全面修復",
        description: "以傳統工法完成整體修復工程。",
        icon: "mdi-tools",
        color: "error",
    },
];

const BOARD: &[BoardMember] = &[
    BoardMember {
        name: "張文華",
        title: "理事長",
        description: "長年投入古蹟保存與修復工作。",
        expertise: &["古蹟修復", "建築史"],
    },
    BoardMember {
        name: "李美玲",
        title: "副理事長",
        description: "專注文化資產管理與教育推廣。",
        expertise: &["文化資產", "教育推廣"],
    },
];

const FEATURES: &[SiteFeature] = &[
    SiteFeature {
        title: "建築藝術",
        description: "保存完整的清代木構造與彩繪。",
        icon: "mdi-palette",
    },
    SiteFeature {
        title: "導覽服務",
        description: "週末提供定時導覽與團體預約。",
        icon: "mdi-walk",
    },
];

const PUBLIC_AFFAIRS: &[PublicAffairsItem] = &[
    PublicAffairsItem {
        title: "修復工程說明會",
        category: "工程",
        date: "2024-03-15",
        summary: "說明東廂房修復範圍與期程。",
    },
    PublicAffairsItem {
        title: "志工招募",
        category: "活動",
        date: "2024-04-01",
        summary: "招募導覽與文物整理志工。",
    },
];

pub async fn history_page() -> Json<&'static [TimelineEvent]> {
    Json(TIMELINE)
}

pub async fn directors_page() -> Json<&'static [BoardMember]> {
    Json(BOARD)
}

pub async fn features_page() -> Json<&'static [SiteFeature]> {
    Json(FEATURES)
}

pub async fn public_affairs_page() -> Json<&'static [PublicAffairsItem]> {
    Json(PUBLIC_AFFAIRS)
}
