//! 二重カウント
//!
//! 1回目はステータス別、2回目は品番別に独立に数え、合計を突き合わせる。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use warehouse_recon_common::{MarkingRecord, StatusTier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCount {
    pub article: String,
    pub count: usize,
}

/// 1回目: ステータス別
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub total_photos: usize,
    pub by_status: BTreeMap<StatusTier, usize>,
}

/// 2回目: 品番別（最初に出てきた順）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTally {
    pub readable_markings: usize,
    pub records_with_article: usize,
    pub unique_articles: usize,
    pub by_article: Vec<ArticleCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossCheck {
    /// ステータス別の合計 == 記録数
    pub status_total_matches: bool,
    /// 品番別の合計 == 品番のある記録数
    pub article_total_matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountVerification {
    pub first_count: StatusCount,
    pub second_count: ArticleTally,
    pub verification: CrossCheck,
}

impl CountVerification {
    pub fn is_consistent(&self) -> bool {
        self.verification.status_total_matches && self.verification.article_total_matches
    }

    pub fn article_count(&self, article: &str) -> usize {
        self.second_count
            .by_article
            .iter()
            .find(|a| a.article == article)
            .map(|a| a.count)
            .unwrap_or(0)
    }
}

pub fn count_markings(markings: &[MarkingRecord]) -> CountVerification {
    let mut by_status: BTreeMap<StatusTier, usize> = BTreeMap::new();
    for marking in markings {
        *by_status.entry(marking.status_tier).or_insert(0) += 1;
    }

    let mut by_article: Vec<ArticleCount> = Vec::new();
    let mut records_with_article = 0;
    for article in markings.iter().filter_map(|m| m.article_key()) {
        records_with_article += 1;
        match by_article.iter_mut().find(|a| a.article == article) {
            Some(entry) => entry.count += 1,
            None => by_article.push(ArticleCount {
                article: article.to_string(),
                count: 1,
            }),
        }
    }

    let unique_articles = by_article
        .iter()
        .map(|a| a.article.as_str())
        .collect::<HashSet<_>>()
        .len();
    let readable_markings = markings.iter().filter(|m| m.readable).count();

    let verification = CrossCheck {
        status_total_matches: by_status.values().sum::<usize>() == markings.len(),
        article_total_matches: by_article.iter().map(|a| a.count).sum::<usize>() == records_with_article,
    };

    let result = CountVerification {
        first_count: StatusCount {
            total_photos: markings.len(),
            by_status,
        },
        second_count: ArticleTally {
            readable_markings,
            records_with_article,
            unique_articles,
            by_article,
        },
        verification,
    };

    if !result.is_consistent() {
        tracing::warn!(?verification, "二重カウントの合計が一致しません");
    }
    result
}
