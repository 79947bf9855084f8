//! Sample posts written into an empty local cache on first run.

use chrono::{DateTime, NaiveDate, Utc};
use domains::{Post, PostId, Result};
use tracing::info;

use crate::cache::LocalCache;

fn day(year: i32, month: u32, date: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, date)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

fn sample(
    id: i64,
    board_id: &str,
    title: &str,
    content: &str,
    source: &str,
    author: &str,
    created_at: DateTime<Utc>,
) -> Post {
    Post {
        id: PostId::Local(id),
        board_id: board_id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        source: Some(source.to_string()),
        author: author.to_string(),
        created_at,
    }
}

pub fn sample_posts() -> Vec<Post> {
    vec![
        sample(
            1,
            "job-info",
            "PM의 핵심 역할과 책임",
            "프로덕트 매니저(PM)는 제품의 전략 수립부터 출시까지 전 과정을 관리하는 핵심 역할을 담당합니다.\n\n\
             <strong>주요 업무:</strong>\n\
             • 제품 로드맵 수립 및 관리\n\
             • 시장 조사 및 사용자 요구사항 분석\n\
             • 개발팀과의 협업 및 일정 관리\n\
             • 성과 분석 및 개선 방안 도출\n\n\
             실무에서는 다양한 이해관계자들과의 소통이 매우 중요합니다.",
            "PM 실무 가이드북",
            "관리자",
            day(2024, 12, 20),
        ),
        sample(
            2,
            "job-info",
            "PO와 PM의 차이점 완벽 정리",
            "많은 분들이 헷갈려하시는 PO(Product Owner)와 PM(Product Manager)의 차이점을 명확히 정리했습니다.\n\n\
             <strong>Product Owner (PO):</strong>\n\
             • 애자일/스크럼 팀의 제품 책임자\n\
             • 백로그 관리 및 우선순위 결정\n\
             • 개발팀과 밀접한 협업\n\n\
             <strong>Product Manager (PM):</strong>\n\
             • 제품 전략 및 비전 수립\n\
             • 시장 분석 및 경쟁사 분석\n\
             • 비즈니스 성과 책임\n\n\
             실제로는 회사마다 역할 정의가 다를 수 있습니다.",
            "https://example.com/po-vs-pm",
            "PM김철수",
            day(2024, 12, 19),
        ),
        sample(
            3,
            "career-prep",
            "PM 포트폴리오 작성 완전 가이드",
            "PM 취업을 위한 포트폴리오 작성법을 단계별로 안내드립니다.\n\n\
             <strong>1. 프로젝트 선정</strong>\n\
             실제 업무 경험이나 개인 프로젝트 중 성과가 명확한 것을 선택하세요.\n\n\
             <strong>2. 구성 요소</strong>\n\
             • 문제 정의 및 배경\n\
             • 해결 과정 및 방법론\n\
             • 성과 및 학습점\n\n\
             <strong>3. 시각화</strong>\n\
             • 플로우차트, 와이어프레임 활용\n\
             • 데이터는 그래프로 표현\n\
             • Before/After 비교 필수",
            "PM 취업 준비 커뮤니티",
            "취업멘토",
            day(2024, 12, 18),
        ),
        sample(
            4,
            "news",
            "2024년 PM 채용 시장 동향 분석",
            "올해 PM 채용 시장의 주요 트렌드를 분석해보았습니다.\n\n\
             <strong>주요 트렌드:</strong>\n\
             • AI/ML 이해도 요구 증가\n\
             • 데이터 분석 역량 중시\n\
             • 사용자 경험(UX) 전문성 강화\n\
             • 애자일/스크럼 경험 필수\n\n\
             <strong>주요 기업별 채용 현황:</strong>\n\
             • 테크 스타트업: 전년 대비 30% 증가\n\
             • 대기업: 신규 디지털 전환 프로젝트 확대\n\
             • 금융권: 핀테크 부문 PM 수요 증가",
            "IT 채용 동향 리포트 2024",
            "뉴스팀",
            day(2024, 12, 17),
        ),
    ]
}

/// Writes [`sample_posts`] into `cache` when it holds no posts, or
/// unconditionally with `force`. Returns the number of posts written.
pub async fn seed_if_empty(cache: &LocalCache, force: bool) -> Result<usize> {
    let existing = cache.load().await;
    if existing > 0 && !force {
        info!(existing, "local cache already populated, skipping seed");
        return Ok(0);
    }
    let written = cache.replace(sample_posts()).await?;
    info!(written, key = cache.key(), "sample posts seeded");
    Ok(written)
}
