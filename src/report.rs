use std::fmt::Write;

use comfy_table::{presets, CellAlignment, Table, TableComponent};

use crate::aggregate::{self, CrossTab};
use crate::config::{SessionConfig, SignupConfig};
use crate::forecast;
use crate::loader::{self, SignupTable};
use crate::models::{
    Attribute, DistributionEntry, FunnelCounts, SessionRecord, SignupRecord, SlotEstimate,
    SlotForecast,
};
use crate::monthly::{self, MonthlyCross};

pub const PROFILE_ATTRIBUTES: [Attribute; 4] = [
    Attribute::Age,
    Attribute::Income,
    Attribute::Credit,
    Attribute::Willingness,
];

pub const SEGMENT_ATTRIBUTES: [Attribute; 5] = [
    Attribute::Age,
    Attribute::Income,
    Attribute::Job,
    Attribute::Credit,
    Attribute::Willingness,
];

const TOTAL_LABEL: &str = "合計";
const MISSING_LABEL: &str = "(空欄)";

fn rule(output: &mut String, ch: char, width: usize) {
    let _ = writeln!(output, "{}", ch.to_string().repeat(width));
}

fn banner(output: &mut String, ch: char, width: usize, title: &str) {
    let _ = writeln!(output);
    rule(output, ch, width);
    let _ = writeln!(output, "{title}");
    rule(output, ch, width);
}

fn pct(value: f64) -> String {
    format!("{value:.1}%")
}

fn cell_pct(value: Option<f64>) -> String {
    value.map(pct).unwrap_or_else(|| "-".to_string())
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Every pair of attributes, in list order.
fn pairs(attributes: &[Attribute]) -> Vec<(Attribute, Attribute)> {
    let mut pairs = Vec::new();
    for (i, row) in attributes.iter().enumerate() {
        for col in &attributes[i + 1..] {
            pairs.push((*row, *col));
        }
    }
    pairs
}

/// Borderless grid: first column left-aligned, the rest right-aligned, columns
/// sized by display width so full-width text lines up.
fn write_grid(output: &mut String, header: &[String], rows: &[Vec<String>]) {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_style(TableComponent::VerticalLines, '|')
        .set_style(TableComponent::HeaderLines, '-')
        .set_style(TableComponent::MiddleHeaderIntersections, '+')
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row.clone());
    }
    for column in table.column_iter_mut().skip(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }

    for line in table.to_string().lines() {
        let _ = writeln!(output, " {}", line.trim_end());
    }
}

fn funnel_header(label: &str) -> Vec<String> {
    [label, "申込数", "実施数", "実施率", "成約数", "対申込成約率", "対実施成約率"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

fn funnel_cells(label: &str, counts: &FunnelCounts) -> Vec<String> {
    vec![
        label.to_string(),
        counts.submitted.to_string(),
        counts.executed.to_string(),
        pct(counts.execution_rate()),
        counts.closed.to_string(),
        pct(counts.closing_rate()),
        pct(counts.closing_rate_vs_executed()),
    ]
}

fn write_funnel_table<'a>(
    output: &mut String,
    label: &str,
    rows: impl IntoIterator<Item = (&'a str, &'a FunnelCounts)>,
    total: &FunnelCounts,
) {
    let mut cells: Vec<Vec<String>> = rows
        .into_iter()
        .map(|(category, counts)| funnel_cells(category, counts))
        .collect();
    cells.push(funnel_cells(&format!("【{TOTAL_LABEL}】"), total));
    write_grid(output, &funnel_header(label), &cells);
}

fn write_distribution(
    output: &mut String,
    entries: Vec<DistributionEntry>,
    total: usize,
    attribute: Attribute,
) {
    let rows: Vec<Vec<String>> = entries
        .into_iter()
        .map(|entry| {
            let share = crate::models::percent(entry.count, total);
            vec![
                entry.value.unwrap_or_else(|| MISSING_LABEL.to_string()),
                format!("{}件", entry.count),
                pct(share),
                "█".repeat(share as usize),
            ]
        })
        .collect();
    let header = vec![
        attribute.label().to_string(),
        "件数".to_string(),
        "割合".to_string(),
        String::new(),
    ];
    write_grid(output, &header, &rows);
}

fn write_count_matrix(output: &mut String, cross: &CrossTab, counts: &[Vec<usize>], closed: bool) {
    let total_of = |c: FunnelCounts| if closed { c.closed } else { c.submitted };
    let mut header = vec![String::new()];
    header.extend(cross.col_keys.iter().cloned());
    header.push(TOTAL_LABEL.to_string());

    let mut rows: Vec<Vec<String>> = cross
        .row_keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let mut row = vec![key.clone()];
            row.extend(counts[i].iter().map(usize::to_string));
            row.push(total_of(cross.row_counts(i)).to_string());
            row
        })
        .collect();
    let mut footer = vec![TOTAL_LABEL.to_string()];
    footer.extend((0..cross.col_keys.len()).map(|j| total_of(cross.col_counts(j)).to_string()));
    footer.push(total_of(cross.grand_total()).to_string());
    rows.push(footer);
    write_grid(output, &header, &rows);
}

fn write_rate_matrix(output: &mut String, cross: &CrossTab) {
    let mut header = vec![String::new()];
    header.extend(cross.col_keys.iter().cloned());
    header.push(TOTAL_LABEL.to_string());

    let mut rows: Vec<Vec<String>> = cross
        .row_keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let mut row = vec![key.clone()];
            row.extend((0..cross.col_keys.len()).map(|j| cell_pct(cross.rate(i, j))));
            row.push(pct(cross.row_counts(i).closing_rate()));
            row
        })
        .collect();
    let mut footer = vec![TOTAL_LABEL.to_string()];
    footer.extend((0..cross.col_keys.len()).map(|j| pct(cross.col_counts(j).closing_rate())));
    footer.push(pct(cross.grand_total().closing_rate()));
    rows.push(footer);
    write_grid(output, &header, &rows);
}

fn write_row_shares(output: &mut String, cross: &CrossTab) {
    let mut header = vec![String::new()];
    header.extend(cross.col_keys.iter().cloned());
    let rows: Vec<Vec<String>> = cross
        .row_keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let mut row = vec![key.clone()];
            row.extend(cross.row_shares(i).into_iter().map(pct));
            row
        })
        .collect();
    write_grid(output, &header, &rows);
}

/// Value counts per attribute and plain attribute-pair cross counts.
pub fn build_distribution_report(table: &SignupTable) -> String {
    let records = &table.records;
    let mut output = String::new();

    banner(&mut output, '=', 80, "【データ概要】");
    let _ = writeln!(output, "総レコード数: {}", records.len());
    if !table.headers.is_empty() {
        let _ = writeln!(output, "\nカラム一覧:");
        for (i, header) in table.headers.iter().enumerate() {
            let _ = writeln!(output, "  {i}: {}", header.replace(['\n', '\r'], " "));
        }
    }

    banner(&mut output, '=', 80, "【1. 個々のデータ分類】");
    for attribute in PROFILE_ATTRIBUTES {
        banner(&mut output, '-', 60, &format!("■ {}分布", attribute.label()));
        // Brackets read in order; the other answers rank by volume.
        let entries = if attribute == Attribute::Age {
            aggregate::distribution_by_value(records, attribute)
        } else {
            aggregate::distribution(records, attribute)
        };
        write_distribution(&mut output, entries, records.len(), attribute);
    }

    banner(&mut output, '=', 80, "【2. クロス分析】");
    for (n, (row, col)) in pairs(&PROFILE_ATTRIBUTES).into_iter().enumerate() {
        let cross = aggregate::cross_tab(records, row, col);
        banner(
            &mut output,
            '-',
            60,
            &format!("■ クロス分析{}: {} × {}", n + 1, row.label(), col.label()),
        );
        write_count_matrix(&mut output, &cross, &cross.submitted, false);
        let _ = writeln!(output, "\n[行割合 %]");
        write_row_shares(&mut output, &cross);
    }

    let _ = writeln!(output);
    rule(&mut output, '=', 80);
    let _ = writeln!(output, "分析完了");
    output
}

/// Attribute × closing rate, attribute pairs × closing rate and the closed-deal plan mix.
pub fn build_conversion_report(table: &SignupTable) -> String {
    let records = &table.records;
    let everyone = aggregate::overall(records);
    let closed: Vec<SignupRecord> = records.iter().filter(|r| r.closed).cloned().collect();
    let mut output = String::new();

    banner(&mut output, '=', 90, "【成約データ概要】");
    let _ = writeln!(output, "総申込数:           {}件", everyone.submitted);
    let _ = writeln!(
        output,
        "個別相談実施数:     {}件（実施率: {}）",
        everyone.executed,
        pct(everyone.execution_rate())
    );
    let breakdown: Vec<String> = aggregate::distribution(&closed, Attribute::Outcome)
        .into_iter()
        .map(|entry| {
            format!(
                "{} {}",
                entry.value.unwrap_or_else(|| MISSING_LABEL.to_string()),
                entry.count
            )
        })
        .collect();
    let _ = writeln!(
        output,
        "成約数:             {}件（{}）",
        everyone.closed,
        breakdown.join(" + ")
    );
    let _ = writeln!(output, "対申込成約率:       {}", pct(everyone.closing_rate()));
    let _ = writeln!(
        output,
        "対実施成約率:       {}",
        pct(everyone.closing_rate_vs_executed())
    );

    let _ = writeln!(output, "\n--- 結果の内訳 ---");
    write_distribution(
        &mut output,
        aggregate::distribution(records, Attribute::Outcome),
        records.len(),
        Attribute::Outcome,
    );

    let _ = writeln!(output);
    rule(&mut output, '#', 90);
    let _ = writeln!(output, "# 各属性 × 成約率 クロス分析");
    rule(&mut output, '#', 90);
    for attribute in PROFILE_ATTRIBUTES {
        let conversion = aggregate::conversion_by(records, attribute);
        banner(&mut output, '=', 90, &format!("■ {} × 成約率", attribute.label()));
        write_funnel_table(
            &mut output,
            attribute.label(),
            conversion
                .rows
                .iter()
                .map(|row| (row.category.as_str(), &row.counts)),
            &conversion.total,
        );
    }

    let _ = writeln!(output);
    rule(&mut output, '#', 90);
    let _ = writeln!(output, "# 属性 × 属性 × 成約率 クロス分析");
    rule(&mut output, '#', 90);
    for (row, col) in pairs(&PROFILE_ATTRIBUTES) {
        let cross = aggregate::cross_tab(records, row, col);
        banner(
            &mut output,
            '=',
            90,
            &format!("■ {} × {} × 成約率", row.label(), col.label()),
        );
        let _ = writeln!(output, "\n[申込数]");
        write_count_matrix(&mut output, &cross, &cross.submitted, false);
        let _ = writeln!(output, "\n[成約数]");
        write_count_matrix(&mut output, &cross, &cross.closed, true);
        let _ = writeln!(output, "\n[成約率 %]");
        write_rate_matrix(&mut output, &cross);
    }

    if table.has(Attribute::Plan) || table.has(Attribute::Amount) {
        banner(&mut output, '=', 90, "■ 補足: 成約者の契約プラン内訳");
        let _ = writeln!(output, "\n成約者数: {}件", closed.len());
        for attribute in [Attribute::Plan, Attribute::Amount] {
            if table.has(attribute) {
                let _ = writeln!(output, "\n--- {} ---", attribute.label());
                write_distribution(
                    &mut output,
                    aggregate::distribution(&closed, attribute),
                    closed.len(),
                    attribute,
                );
            }
        }
    }

    let _ = writeln!(output);
    rule(&mut output, '=', 90);
    let _ = writeln!(output, "分析完了");
    output
}

fn write_segment_cross(output: &mut String, cross: &CrossTab, rows: &[usize], segment: &str) {
    let mut header = vec![segment.to_string(), "n".to_string()];
    header.extend(cross.col_keys.iter().map(|key| truncate(key, 12)));
    let shares: Vec<Vec<String>> = rows
        .iter()
        .map(|i| {
            let mut row = vec![
                cross.row_keys[*i].clone(),
                cross.row_counts(*i).submitted.to_string(),
            ];
            row.extend(cross.row_shares(*i).into_iter().map(pct));
            row
        })
        .collect();
    let _ = writeln!(output, "\n[構成比 %]");
    write_grid(output, &header, &shares);

    header.push("全体".to_string());
    let rates: Vec<Vec<String>> = rows
        .iter()
        .map(|i| {
            let counts = cross.row_counts(*i);
            let mut row = vec![cross.row_keys[*i].clone(), counts.submitted.to_string()];
            row.extend((0..cross.col_keys.len()).map(|j| cell_pct(cross.rate(*i, j))));
            row.push(pct(counts.closing_rate()));
            row
        })
        .collect();
    let _ = writeln!(output, "\n[成約率 %]");
    write_grid(output, &header, &rates);
}

/// Route and channel funnels plus route × attribute composition and closing rates.
pub fn build_route_report(table: &SignupTable, config: &SignupConfig) -> String {
    let records = &table.records;
    let mut output = String::new();

    let routes = aggregate::conversion_by(records, Attribute::Route).ranked_by_closed();
    banner(&mut output, '=', 110, "■ フロント流入経路（大分類）× 成約率");
    write_funnel_table(
        &mut output,
        "流入経路",
        routes.rows.iter().map(|row| (row.category.as_str(), &row.counts)),
        &routes.total,
    );

    let channels = aggregate::conversion_by(records, Attribute::Channel).ranked_by_closed();
    banner(&mut output, '=', 110, "■ チャネル大分類 × 成約率");
    write_funnel_table(
        &mut output,
        "チャネル",
        channels
            .rows
            .iter()
            .map(|row| (row.category.as_str(), &row.counts)),
        &channels.total,
    );

    for attribute in SEGMENT_ATTRIBUTES {
        let cross = aggregate::cross_tab(records, Attribute::Route, attribute);
        let rows = cross.rows_by_volume(config.route_min_samples);
        banner(
            &mut output,
            '=',
            110,
            &format!(
                "■ 流入経路 × {}（n≧{}の経路のみ）",
                attribute.label(),
                config.route_min_samples
            ),
        );
        write_segment_cross(&mut output, &cross, &rows, "流入経路");
    }

    let _ = writeln!(output);
    rule(&mut output, '=', 110);
    let _ = writeln!(output, "分析完了");
    output
}

fn month_count_rows(
    months: &[String],
    values: &[Vec<usize>],
    cross: &CrossTab,
    closed: bool,
) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = months
        .iter()
        .zip(values)
        .map(|(month, counts)| {
            let mut row = vec![month.clone()];
            row.extend(counts.iter().map(usize::to_string));
            row.push(counts.iter().sum::<usize>().to_string());
            row
        })
        .collect();

    let column_totals: Vec<usize> = (0..cross.col_keys.len())
        .map(|j| {
            let counts = cross.col_counts(j);
            if closed {
                counts.closed
            } else {
                counts.submitted
            }
        })
        .collect();
    let mut footer = vec![TOTAL_LABEL.to_string()];
    footer.extend(column_totals.iter().map(usize::to_string));
    footer.push(column_totals.iter().sum::<usize>().to_string());
    rows.push(footer);
    rows
}

/// Month funnel summary and month × attribute tables.
pub fn build_monthly_report(table: &SignupTable) -> String {
    let records = &table.records;
    let mut output = String::new();

    let (months, total) = monthly::summarize(records);
    banner(&mut output, '=', 100, "■ 月別 全体サマリー");
    write_funnel_table(
        &mut output,
        "月",
        months.iter().map(|row| (row.month.as_str(), &row.counts)),
        &total,
    );

    for attribute in SEGMENT_ATTRIBUTES {
        let monthly = MonthlyCross::build(records, attribute);
        let cross = &monthly.cross;
        banner(
            &mut output,
            '=',
            100,
            &format!("■ 月別 × {} × 成約率", attribute.label()),
        );

        let mut header = vec!["月".to_string()];
        header.extend(cross.col_keys.iter().map(|key| truncate(key, 12)));
        header.push(TOTAL_LABEL.to_string());

        let submitted: Vec<Vec<usize>> =
            monthly.months.iter().map(|month| monthly.submitted(month)).collect();
        let closed: Vec<Vec<usize>> =
            monthly.months.iter().map(|month| monthly.closed(month)).collect();
        let _ = writeln!(output, "\n[申込数]");
        write_grid(
            &mut output,
            &header,
            &month_count_rows(&monthly.months, &submitted, cross, false),
        );
        let _ = writeln!(output, "\n[成約数]");
        write_grid(
            &mut output,
            &header,
            &month_count_rows(&monthly.months, &closed, cross, true),
        );

        let mut rate_rows: Vec<Vec<String>> = monthly
            .months
            .iter()
            .map(|month| {
                let mut row = vec![month.clone()];
                row.extend(monthly.rates(month).into_iter().map(cell_pct));
                row.push(pct(monthly.month_rate(month)));
                row
            })
            .collect();
        let mut footer = vec![TOTAL_LABEL.to_string()];
        footer.extend((0..cross.col_keys.len()).map(|j| pct(cross.col_counts(j).closing_rate())));
        footer.push(pct(cross.grand_total().closing_rate()));
        rate_rows.push(footer);
        let _ = writeln!(output, "\n[成約率 %]");
        write_grid(&mut output, &header, &rate_rows);

        let share_rows: Vec<Vec<String>> = monthly
            .months
            .iter()
            .map(|month| {
                let shares = monthly.composition(month);
                let filled = shares.iter().sum::<f64>();
                let mut row = vec![month.clone()];
                row.extend(shares.into_iter().map(pct));
                row.push(pct(filled));
                row
            })
            .collect();
        let _ = writeln!(output, "\n[月別 {} 構成比 %]", attribute.label());
        write_grid(&mut output, &header, &share_rows);
    }

    let _ = writeln!(output);
    rule(&mut output, '=', 100);
    let _ = writeln!(output, "分析完了");
    output
}

/// Funnel per seminar date plus seminar × attribute composition and closing rates.
pub fn build_seminar_report(table: &SignupTable) -> String {
    let records = &table.records;
    let mut output = String::new();

    let seminars = aggregate::conversion_by(records, Attribute::Seminar);
    banner(&mut output, '=', 100, "■ セミナー別サマリー");
    write_funnel_table(
        &mut output,
        "セミナー日",
        seminars
            .rows
            .iter()
            .map(|row| (row.category.as_str(), &row.counts)),
        &seminars.total,
    );

    for attribute in SEGMENT_ATTRIBUTES {
        let cross = aggregate::cross_tab(records, Attribute::Seminar, attribute);
        let rows: Vec<usize> = (0..cross.row_keys.len()).collect();
        banner(
            &mut output,
            '=',
            100,
            &format!("■ セミナー別 × {}", attribute.label()),
        );
        write_segment_cross(&mut output, &cross, &rows, "セミナー日");
    }

    let _ = writeln!(output);
    rule(&mut output, '=', 100);
    let _ = writeln!(output, "分析完了");
    output
}

/// Consultant funnels against the overall closing rate, and per-attribute
/// closing rates for consultants with enough sign-ups.
pub fn build_staff_report(table: &SignupTable, config: &SignupConfig) -> String {
    let records = &table.records;
    let (summaries, everyone) = aggregate::staff_summary(records);
    let mut output = String::new();

    banner(&mut output, '=', 100, "■ 担当者別サマリー（成約率降順）");
    let mut header = funnel_header("担当者");
    header[1] = "担当数".to_string();
    header[5] = "対担当成約率".to_string();
    header.push("全体成約率".to_string());
    header.push("差分".to_string());
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|summary| {
            let mut row = funnel_cells(&summary.staff, &summary.counts);
            row.push(pct(everyone.closing_rate()));
            row.push(format!("{:+.1}pt", summary.diff_points));
            row
        })
        .collect();
    write_grid(&mut output, &header, &rows);

    let main_staff: Vec<&str> = summaries
        .iter()
        .filter(|summary| summary.counts.submitted >= config.staff_min_samples)
        .map(|summary| summary.staff.as_str())
        .collect();

    for attribute in SEGMENT_ATTRIBUTES {
        let cross = aggregate::cross_tab(records, Attribute::Staff, attribute);
        let overall = aggregate::conversion_by(records, attribute);
        banner(
            &mut output,
            '=',
            100,
            &format!(
                "■ 担当者別 × {}【成約率 %】（担当{}件以上）",
                attribute.label(),
                config.staff_min_samples
            ),
        );

        let mut header = vec!["担当者".to_string(), "n".to_string()];
        header.extend(overall.rows.iter().map(|row| truncate(&row.category, 12)));
        header.push("全体".to_string());

        let mut rows: Vec<Vec<String>> = main_staff
            .iter()
            .map(|staff| {
                let mut row = vec![staff.to_string()];
                match cross.row_index(staff) {
                    Some(i) => {
                        let counts = cross.row_counts(i);
                        row.push(counts.submitted.to_string());
                        row.extend(overall.rows.iter().map(|category| {
                            let j = cross
                                .col_keys
                                .iter()
                                .position(|key| *key == category.category);
                            cell_pct(j.and_then(|j| cross.rate(i, j)))
                        }));
                        row.push(pct(counts.closing_rate()));
                    }
                    None => {
                        row.push("0".to_string());
                        row.extend(overall.rows.iter().map(|_| "-".to_string()));
                        row.push(pct(0.0));
                    }
                }
                row
            })
            .collect();

        let mut average = vec![
            "【全体平均】".to_string(),
            overall.total.submitted.to_string(),
        ];
        average.extend(overall.rows.iter().map(|row| pct(row.counts.closing_rate())));
        average.push(pct(overall.total.closing_rate()));
        rows.push(average);
        write_grid(&mut output, &header, &rows);
    }

    let _ = writeln!(output);
    rule(&mut output, '=', 100);
    let _ = writeln!(output, "分析完了");
    output
}

fn slot_label(forecast: &SlotForecast) -> String {
    format!(
        "{}・{}",
        loader::weekday_kanji(forecast.weekday),
        forecast.slot.label()
    )
}

fn range_cells(label: &str, estimate: &SlotEstimate, note: &str) -> Vec<String> {
    let range = &estimate.consultations;
    vec![
        label.to_string(),
        format!("{:.1}", range.mean),
        format!("{:.1}", range.low),
        format!("{:.1}", range.high),
        format!("{}回", range.samples),
        estimate.confidence.stars().to_string(),
        note.to_string(),
    ]
}

fn funnel_cells_for(label: &str, estimate: &SlotEstimate, note: &str) -> Vec<String> {
    let range = &estimate.consultations;
    vec![
        label.to_string(),
        format!(
            "{:.1} → {:.1} → {:.1}",
            estimate.registration_mean, estimate.seated_mean, range.mean
        ),
        format!("{:.1} 〜 {:.1}", range.low, range.high),
        range.samples.to_string(),
        format!("{} {}", estimate.confidence.stars(), note)
            .trim_end()
            .to_string(),
    ]
}

fn sparse_note(forecast: &SlotForecast, config: &SessionConfig) -> &'static str {
    if config.is_sparse(forecast.weekday, forecast.slot) {
        "※サンプル極少"
    } else {
        ""
    }
}

/// Ranked consultation ranges per weekday/slot and the registration → seated
/// → consultation funnel view.
pub fn build_forecast_report(sessions: &[SessionRecord], config: &SessionConfig) -> String {
    let forecasts = forecast::forecast(sessions, &config.adjustments);
    let mut output = String::new();

    rule(&mut output, '=', 80);
    let from = config
        .window_start()
        .map(|start| start.to_string())
        .unwrap_or_default();
    let _ = writeln!(
        output,
        "  個別相談申込数 予測レンジ（{from}〜{}、{}日間）",
        config.reference_date, config.window_days
    );
    for adjustment in &config.adjustments {
        let _ = writeln!(
            output,
            "  ※{}{}は補正値も併記（{}）",
            loader::weekday_kanji(adjustment.weekday),
            adjustment.slot.label(),
            adjustment.note
        );
    }
    rule(&mut output, '=', 80);

    if forecasts.is_empty() {
        let _ = writeln!(output, "対象期間のセッションがありません。");
        return output;
    }

    let _ = writeln!(output);
    let header: Vec<String> = ["", "予測値", "下限", "上限", "サンプル", "信頼度", "備考"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut rows = Vec::new();
    for forecast in &forecasts {
        let label = slot_label(forecast);
        match &forecast.adjusted {
            Some(adjusted) => {
                rows.push(range_cells(&label, &forecast.raw, "外れ値込み"));
                rows.push(range_cells("〃補正", &adjusted.estimate, &adjusted.note));
            }
            None => rows.push(range_cells(
                &label,
                &forecast.raw,
                sparse_note(forecast, config),
            )),
        }
    }
    write_grid(&mut output, &header, &rows);

    let _ = writeln!(output);
    rule(&mut output, '─', 80);
    let _ = writeln!(output, "【予測フロー】申込 → 着席 → 個別申込（現実的な予測値）");
    rule(&mut output, '─', 80);
    let header: Vec<String> = ["", "申込 → 着席 → 個別", "個別レンジ", "n", "信頼度"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows: Vec<Vec<String>> = forecasts
        .iter()
        .map(|forecast| {
            let label = slot_label(forecast);
            match &forecast.adjusted {
                Some(adjusted) => funnel_cells_for(&label, &adjusted.estimate, "補正済"),
                None => funnel_cells_for(&label, &forecast.raw, sparse_note(forecast, config)),
            }
        })
        .collect();
    write_grid(&mut output, &header, &rows);

    output
}
