//! Built-in document profiles.
//!
//! One [`DocumentSchema`] per supported form template. Everything here is
//! data: detection markers, classification rules, label vocabularies,
//! default column layouts and derived-field wiring, taken from the fixed
//! bureaucratic templates these documents follow. The engine itself knows
//! nothing about any particular form.
//!
//! Registration order doubles as detection order. The settlement-report and
//! design-review profiles carry no detection markers — their documents are
//! only processed under an explicit document-type hint.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::matcher::MatcherChain;
use crate::schema::{
    BreakdownSpec, CategoricalDefault, ClassificationRule, Derivation, DocumentSchema, FieldSpec,
    RowsSpec, SchemaRegistry, SectionSchema, SectionSource, TextSpec, ValueCheck,
};

static BUILTIN: Lazy<SchemaRegistry> = Lazy::new(|| {
    SchemaRegistry::new(vec![
        noise_inspection(),
        em_inspection(),
        feasibility_approval_investment(),
        feasibility_review_investment(),
        preliminary_approval_investment(),
        settlement_report(),
        design_review(),
    ])
    .expect("builtin profiles validate")
});

/// The registry of built-in profiles.
pub fn builtin() -> &'static SchemaRegistry {
    &BUILTIN
}

// ── Small constructors for the static data below ─────────────────────────

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static profile pattern")
}

fn chain(doc_type: &str, patterns: &[&str]) -> MatcherChain {
    MatcherChain::new(doc_type, patterns).expect("static profile pattern")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn marker_groups(groups: &[&[&str]]) -> Vec<Vec<String>> {
    groups.iter().map(|g| strings(g)).collect()
}

// ── Pollution-source noise inspection log ────────────────────────────────

fn noise_inspection() -> DocumentSchema {
    let weather = SectionSchema {
        name: "weather".into(),
        fields: vec![
            FieldSpec::column("monitorAt", &["日期"], None),
            FieldSpec::column("weather", &["天气"], None),
            FieldSpec::column("temp", &["温度"], None),
            FieldSpec::column("humidity", &["湿度"], None),
            FieldSpec::column("windSpeed", &["风速"], None),
            FieldSpec::column("windDirection", &["风向"], None),
        ],
        source: SectionSource::LabeledText(TextSpec {
            anchors: strings(&["气象条件"]),
            segment: Some(re(r"日期[:：]\s*([\d.\-]+)")),
            segment_field: Some("monitorAt".into()),
            chains: vec![
                ("weather".into(), chain("noiseRec", &[r"天气[：:]?\s*([^\s温度湿度风速风向日期]+)"])),
                ("temp".into(), chain("noiseRec", &[r"温度[：:]?\s*([0-9.\-]+)"])),
                ("humidity".into(), chain("noiseRec", &[r"湿度[：:]?\s*([0-9.\-]+)"])),
                (
                    "windSpeed".into(),
                    chain("noiseRec", &[r"风速[：:]?\s*([0-9.\-]+)\s*m/s", r"风速[：:]?\s*([0-9.\-]+)"]),
                ),
                ("windDirection".into(), chain("noiseRec", &[r"风向[：:]?\s*([^\s日期温度湿度风速]+)"])),
            ],
        }),
    };

    // Day columns listed before night columns: the shared 检测时间/测量值
    // keywords resolve by claim order.
    let noise = SectionSchema {
        name: "noise".into(),
        fields: vec![
            FieldSpec::column("code", &["编号"], Some(0)),
            FieldSpec::column("address", &["测点位置", "测点"], Some(1)),
            FieldSpec::column("source", &["主要声源", "声源"], Some(2)),
            FieldSpec::column("dayMonitorAt", &["昼间检测时间", "检测时间"], Some(3)),
            FieldSpec::column("dayMonitorValue", &["昼间测量值", "测量值"], Some(4)).numeric(),
            FieldSpec::column("dayMonitorBackgroundValue", &["昼间背景值", "背景值"], Some(5))
                .numeric(),
            FieldSpec::column("nightMonitorAt", &["夜间检测时间", "检测时间"], Some(6)),
            FieldSpec::column("nightMonitorValue", &["夜间测量值", "测量值"], Some(7)).numeric(),
            FieldSpec::column("nightMonitorBackgroundValue", &["夜间背景值", "背景值"], Some(8))
                .numeric(),
            FieldSpec::column("remark", &["备注"], Some(9)),
        ],
        source: SectionSource::Rows(RowsSpec {
            table_rule: None,
            key_field: "code".into(),
            key_pattern: re(r"(?i)^[NM]\d+"),
            min_row_len: 2,
            require: strings(&["code", "address"]),
            skip_pattern: None,
            rekey_prefix: Some("N".into()),
            dedup: true,
        }),
    };

    let operational = SectionSchema {
        name: "operationalConditions".into(),
        fields: vec![
            FieldSpec::column("monitorAt", &["检测时间", "监测时间"], None),
            FieldSpec::column("project", &["项目"], None),
            FieldSpec::column("name", &["名称"], None),
            FieldSpec::column("voltage", &["电压"], None),
            FieldSpec::column("current", &["电流"], None),
            FieldSpec::column("activePower", &["有功功率"], None),
            FieldSpec::column("reactivePower", &["无功功率"], None),
        ],
        source: SectionSource::Rows(RowsSpec {
            table_rule: None,
            key_field: "name".into(),
            key_pattern: re(r"主变|#"),
            min_row_len: 2,
            require: strings(&["name"]),
            skip_pattern: None,
            rekey_prefix: None,
            dedup: false,
        }),
    };

    DocumentSchema {
        doc_type: "noiseRec".into(),
        detect: marker_groups(&[&["污染源噪声检测原始记录表"]]),
        rules: vec![
            ClassificationRule::all("噪声检测数据", &["编号", "昼间", "夜间"]),
            ClassificationRule::any("检测工况", &["有功功率", "无功功率", "电压", "电流"]),
            ClassificationRule::any("检测信息", &["项目名称", "气象条件", "声级计"]),
        ],
        scalars: vec![
            FieldSpec::label("project", &["项目名称"]),
            FieldSpec::label("standardReferences", &["检测依据", "监测依据"]),
            FieldSpec::label("soundLevelMeterMode", &["声级计型号", "声纹计型号"]),
            FieldSpec::label(
                "soundCalibratorMode",
                &["声校准器型号", "声级计校准器型号", "声纹准器型号"],
            ),
            FieldSpec::label("calibrationValueBefore", &["检测前校准值"]),
            FieldSpec::label("calibrationValueAfter", &["检测后校准值"]),
        ],
        sections: vec![weather, noise, operational],
        required_scalars: strings(&[
            "project",
            "standardReferences",
            "soundLevelMeterMode",
            "soundCalibratorMode",
        ]),
        required_sections: strings(&["noise"]),
        defaults: vec![CategoricalDefault {
            section: "weather".into(),
            field: "weather".into(),
            siblings: strings(&["temp", "humidity", "windSpeed"]),
            label: "晴".into(),
        }],
        breakdown: None,
    }
}

// ── Power-frequency EM field inspection log ──────────────────────────────

fn em_inspection() -> DocumentSchema {
    let weather = SectionSchema {
        name: "weather".into(),
        fields: vec![
            FieldSpec::column("weather", &["天气"], None),
            FieldSpec::column("temp", &["温度"], None),
            FieldSpec::column("humidity", &["湿度"], None),
            FieldSpec::column("windSpeed", &["风速"], None),
        ],
        source: SectionSource::LabeledText(TextSpec {
            anchors: strings(&["检测环境条件", "监测环境条件"]),
            segment: None,
            segment_field: None,
            chains: vec![
                ("temp".into(), chain("emRec", &[r"([0-9.\-]+)\s*℃"])),
                ("humidity".into(), chain("emRec", &[r"([0-9.\-]+)\s*%RH"])),
                ("windSpeed".into(), chain("emRec", &[r"([0-9.\-]+)\s*m/s"])),
                ("weather".into(), chain("emRec", &[r"天气[：:]*\s*([^\s]+)"])),
            ],
        }),
    };

    let e_fields = strings(&[
        "powerFrequencyEFieldStrength1",
        "powerFrequencyEFieldStrength2",
        "powerFrequencyEFieldStrength3",
        "powerFrequencyEFieldStrength4",
        "powerFrequencyEFieldStrength5",
    ]);
    let m_fields = strings(&[
        "powerFrequencyMagneticDensity1",
        "powerFrequencyMagneticDensity2",
        "powerFrequencyMagneticDensity3",
        "powerFrequencyMagneticDensity4",
        "powerFrequencyMagneticDensity5",
    ]);

    let mut fields = vec![
        FieldSpec::column("code", &["编号"], Some(0)),
        FieldSpec::column("address", &["测点位置", "测点"], Some(1)),
        FieldSpec::column("height", &["高度"], Some(2)).check(ValueCheck::HeightLike),
        FieldSpec::column("monitorAt", &["检测时间", "监测时间"], Some(3))
            .check(ValueCheck::DateLike),
    ];
    for (i, name) in e_fields.iter().enumerate() {
        fields.push(FieldSpec::column(name, &[], Some(4 + i)));
    }
    fields.push(FieldSpec::derived(
        "avgPowerFrequencyEFieldStrength",
        Derivation::AverageOf(e_fields.clone()),
        Some(9),
    ));
    for (i, name) in m_fields.iter().enumerate() {
        fields.push(FieldSpec::column(name, &[], Some(10 + i)));
    }
    fields.push(FieldSpec::derived(
        "avgPowerFrequencyMagneticDensity",
        Derivation::AverageOf(m_fields),
        Some(15),
    ));

    let electric_magnetic = SectionSchema {
        name: "electricMagnetic".into(),
        fields,
        source: SectionSource::Rows(RowsSpec {
            table_rule: None,
            key_field: "code".into(),
            key_pattern: re(r"(?i)^(EB|ZB)"),
            min_row_len: 8,
            require: strings(&["code"]),
            skip_pattern: None,
            rekey_prefix: None,
            dedup: true,
        }),
    };

    DocumentSchema {
        doc_type: "emRec".into(),
        detect: marker_groups(&[&[
            "工频电场/磁场环境检测原始记录表",
            "工频电场磁场环境检测原始记录表",
        ]]),
        rules: vec![
            ClassificationRule::all("电磁检测数据", &["编号", "测点位置"]),
            ClassificationRule::any("检测信息", &["项目名称", "仪器名称", "检测环境条件"]),
        ],
        scalars: vec![
            FieldSpec::label("project", &["项目名称"]),
            FieldSpec::label("standardReferences", &["监测依据", "检测依据"]),
            FieldSpec::label("deviceName", &["仪器名称"]),
            FieldSpec::label("deviceMode", &["仪器型号"]),
            FieldSpec::label("deviceCode", &["仪器编号"]),
            FieldSpec::label("monitorHeight", &["测量高度", "检测高度"]),
        ],
        sections: vec![weather, electric_magnetic],
        required_scalars: strings(&["project", "standardReferences", "deviceName", "deviceMode"]),
        required_sections: strings(&["electricMagnetic"]),
        defaults: vec![CategoricalDefault {
            section: "weather".into(),
            field: "weather".into(),
            siblings: strings(&["temp", "humidity", "windSpeed"]),
            label: "晴".into(),
        }],
        breakdown: None,
    }
}

// ── Investment estimate tables ───────────────────────────────────────────

fn investment_items(
    name_keywords: &[&str],
    with_scale: bool,
    skip_pattern: Option<Regex>,
) -> SectionSchema {
    let mut fields = vec![
        FieldSpec::column("no", &["序号"], Some(0)),
        FieldSpec::column("name", name_keywords, Some(1)),
    ];
    if with_scale {
        fields.push(FieldSpec::column("constructionScaleOverheadLine", &["架空线"], None));
        fields.push(FieldSpec::column("constructionScaleBay", &["间隔"], None));
        fields.push(FieldSpec::column("constructionScaleSubstation", &["变电"], None));
        fields.push(FieldSpec::column("constructionScaleOpticalCable", &["光缆"], None));
    }
    fields.push(FieldSpec::column("staticInvestment", &["静态投资"], None).amount());
    fields.push(FieldSpec::column("dynamicInvestment", &["动态投资"], None).amount());
    fields.push(FieldSpec::derived(
        "level",
        Derivation::OutlineLevel { no: "no".into(), name: "name".into() },
        None,
    ));

    SectionSchema {
        name: "items".into(),
        fields,
        source: SectionSource::Rows(RowsSpec {
            table_rule: None,
            key_field: "name".into(),
            key_pattern: re(r"\S"),
            min_row_len: 2,
            require: strings(&["name"]),
            skip_pattern,
            rekey_prefix: None,
            dedup: false,
        }),
    }
}

fn investment_breakdown(with_scale: bool) -> BreakdownSpec {
    let mut amount_fields = vec![];
    if with_scale {
        amount_fields.extend(strings(&[
            "constructionScaleOverheadLine",
            "constructionScaleBay",
            "constructionScaleSubstation",
            "constructionScaleOpticalCable",
        ]));
    }
    amount_fields.extend(strings(&["staticInvestment", "dynamicInvestment"]));
    BreakdownSpec {
        section: "items".into(),
        no_field: "no".into(),
        name_field: "name".into(),
        level_field: "level".into(),
        amount_fields,
    }
}

fn feasibility_approval_investment() -> DocumentSchema {
    DocumentSchema {
        doc_type: "feasibilityApprovalInvestment".into(),
        detect: marker_groups(&[
            &["可研批复", "可行性研究报告的批复"],
            &["工程或费用名称", "静态投资"],
            &["架空线", "间隔"],
        ]),
        rules: vec![ClassificationRule::all("投资估算明细", &["名称", "静态投资"])],
        scalars: vec![],
        sections: vec![investment_items(
            &["工程或费用名称", "名称"],
            true,
            // The top-level summary rows (一、/二、/三、) are re-stated in
            // the detail table and skipped here.
            Some(re(r"^[一二三][、，]")),
        )],
        required_scalars: vec![],
        required_sections: strings(&["items"]),
        defaults: vec![],
        breakdown: Some(investment_breakdown(true)),
    }
}

fn feasibility_review_investment() -> DocumentSchema {
    DocumentSchema {
        doc_type: "feasibilityReviewInvestment".into(),
        detect: marker_groups(&[
            &["可研评审", "可行性研究报告的评审意见"],
            &["工程或费用名称", "静态投资"],
        ]),
        rules: vec![ClassificationRule::all("投资估算明细", &["名称", "静态投资"])],
        scalars: vec![],
        sections: vec![investment_items(&["工程或费用名称", "名称"], false, None)],
        required_scalars: vec![],
        required_sections: strings(&["items"]),
        defaults: vec![],
        breakdown: Some(investment_breakdown(false)),
    }
}

fn preliminary_approval_investment() -> DocumentSchema {
    DocumentSchema {
        doc_type: "preliminaryApprovalInvestment".into(),
        detect: marker_groups(&[
            &["初设批复", "初步设计的批复"],
            &["工程名称", "静态投资"],
        ]),
        rules: vec![ClassificationRule::all("投资估算明细", &["名称", "静态投资"])],
        scalars: vec![],
        sections: vec![investment_items(&["工程名称", "名称"], false, None)],
        required_scalars: vec![],
        required_sections: strings(&["items"]),
        defaults: vec![],
        breakdown: Some(investment_breakdown(false)),
    }
}

// ── Settlement report ────────────────────────────────────────────────────

fn settlement_report() -> DocumentSchema {
    let summary = SectionSchema {
        name: "summary".into(),
        fields: vec![
            FieldSpec::column("no", &["序号"], Some(0)),
            FieldSpec::column("content", &["审计内容"], Some(1)),
            FieldSpec::column("submittedAmount", &["送审金额（含税）", "送审金额"], None).amount(),
            FieldSpec::column("approvedAmountTaxed", &["审定金额（含税）"], None).amount(),
            FieldSpec::column("approvedAmountUntaxed", &["审定金额（不含税）"], None).amount(),
            FieldSpec::column("adjustment", &["增减金额"], None).amount(),
            FieldSpec::column("remark", &["备注"], None),
        ],
        source: SectionSource::Rows(RowsSpec {
            table_rule: Some("审定结算汇总表".into()),
            key_field: "content".into(),
            key_pattern: re(r"\S"),
            min_row_len: 3,
            require: strings(&["content"]),
            skip_pattern: None,
            rekey_prefix: None,
            dedup: false,
        }),
    };

    DocumentSchema {
        doc_type: "settlementReport".into(),
        detect: vec![],
        rules: vec![
            ClassificationRule::all(
                "审定结算汇总表",
                &["序号", "审计内容", "送审金额（含税）", "审定金额（含税）", "审定金额（不含税）", "增减金额", "备注"],
            ),
            ClassificationRule::all(
                "合同执行情况",
                &["施工单位", "中标通知书金额", "中标通知书编号", "合同金额", "结算送审金额", "差额"],
            ),
            ClassificationRule::all(
                "赔偿合同",
                &["合同对方", "赔偿事项", "合同金额", "结算送审金额", "差额"],
            ),
            ClassificationRule::all(
                "物资采购合同1",
                &["物料名称", "合同数量", "施工图数量", "单价（不含税）", "差额"],
            ),
            ClassificationRule::all(
                "物资采购合同2",
                &["物料名称", "合同金额（不含税）", "入账金额", "差额", "备注"],
            ),
            ClassificationRule::all(
                "其他服务类合同",
                &["服务商", "中标通知书", "合同金额", "送审金额", "结算金额"],
            ),
        ],
        scalars: vec![],
        sections: vec![summary],
        required_scalars: vec![],
        required_sections: strings(&["summary"]),
        defaults: vec![],
        breakdown: None,
    }
}

// ── Design review estimate ───────────────────────────────────────────────

fn design_review() -> DocumentSchema {
    DocumentSchema {
        doc_type: "designReview".into(),
        detect: vec![],
        rules: vec![ClassificationRule::all(
            "初设评审的概算投资",
            &["序号", "工程名称", "建设规模", "静态投资", "其中：建设场地征用及清理费", "动态投资"],
        )],
        scalars: vec![],
        sections: vec![investment_items(&["工程名称", "名称"], false, None)],
        required_scalars: vec![],
        required_sections: strings(&["items"]),
        defaults: vec![],
        breakdown: Some(investment_breakdown(false)),
    }
}
