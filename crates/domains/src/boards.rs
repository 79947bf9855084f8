//! Static board catalog. Boards are configuration, never persisted.

use serde::Serialize;

/// A named category partitioning posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Board {
    /// Stable identifier used as `boardId` on posts
    pub id: &'static str,
    pub name: &'static str,
}

/// Display name returned for ids outside the catalog.
pub const UNKNOWN_BOARD_NAME: &str = "게시판";

/// Every board, in menu order.
pub static BOARDS: [Board; 6] = [
    Board { id: "job-info", name: "직무" },
    Board { id: "career-prep", name: "취업준비" },
    Board { id: "news", name: "뉴스" },
    Board { id: "policy-library", name: "정책도서관" },
    Board { id: "faq", name: "자주나오는 질문" },
    Board { id: "study", name: "스터디" },
];

pub fn find_board(id: &str) -> Option<&'static Board> {
    BOARDS.iter().find(|b| b.id == id)
}

pub fn is_known_board(id: &str) -> bool {
    find_board(id).is_some()
}

/// Never fails; unknown ids get [`UNKNOWN_BOARD_NAME`].
pub fn board_name(id: &str) -> &'static str {
    find_board(id).map_or(UNKNOWN_BOARD_NAME, |b| b.name)
}
