//! Prompt builders for every model call the pipeline makes. The answers are
//! plain text; the validation lives with the callers in `tasks`.

/// Stage 1 of the enrichment chain: a ~200-character summary in the same
/// language as the article, sentence-final declarative form.
pub const SUMMARY_PREFIX: &str =
    "次の文章を200字程度で要約して。言語は記事本文と同じで。語尾は断定形で: ";

/// Stage 2: tag generation over the stage-1 summary.
pub const TAGS_PREFIX: &str = "次の記事の要約から、トピックを表すタグを生成して：\n";

pub fn summary_prompt(article_text: &str) -> String {
    format!("{}{}", SUMMARY_PREFIX, article_text)
}

pub fn tags_prompt(article_summary: &str) -> String {
    format!(
        r#"{}{}.
登場する企業や組織、業界、分類を表すような5～30個の単語をカンマ区切りで。網羅的に。
最小単位に区切って生成すること。検索性を最大化し、かつ粒度を統一するためのタグを抽出して。
半導体関連の記事は「半導体」というタグを必ず含めて。
製品名、サービス名、企業名などの固有名詞も含めて。日本企業は日本語、外国企業はアルファベットで。

1. 基本実体 (Entities): 記事に登場する固有名詞（企業名、製品名、イベント名、人名）。
2. 構成要素への分解 (Decomposition): 複合語やイベント名を最小単位に分解する。
- 年号が含まれる場合は分離する。
- アルファベットの頭文字（略称）が一般的な場合は追加する。
3. 階層・カテゴリ (Hierarchy & Category): その単語が属する上位概念や業界名を追加する。（テクノロジー、自動車、メーカー、食品、など）
4. 正規化・ブランド名 (Normalization): 正式名称から「株式会社」や「自動車」などの法人格・業種接尾辞を取り除き、一般的な「ブランド名」にする。
- 例: トヨタ自動車 → トヨタ
- 例: 2025年 → 2025

# Rules & Constraints
- 最小単位: 複合語はできるだけ単語単位に分解したタグも併記する。
- 網羅性: 検索されそうな関連ワードは積極的に含める。
- 年号: 「XXXX年」は「XXXX」と4桁の数字のみにする。
- 企業名: 子会社の場合は「子会社名」「親会社/ブランド名」「業界/技術分野」など、関連するタグも含める。
"#,
        TAGS_PREFIX, article_summary
    )
}

/// Last-resort date coercion prompt; the answer must be the bare result.
pub const DATE_PREFIX: &str = "What is the date '";

pub fn date_prompt(raw: &str) -> String {
    format!(
        "What is the date '{}' in the 'yyyy-mm-dd' format? Please answer with only the results.",
        raw
    )
}

/// One-word publisher guess from the article title.
pub const SOURCE_PREFIX: &str = "次の文章の出典を1単語で出力してください:\n";

pub fn source_prompt(title: &str) -> String {
    format!("{}\"{}\"", SOURCE_PREFIX, title)
}
