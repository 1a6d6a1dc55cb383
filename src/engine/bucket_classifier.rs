// ==========================================
// 畜群月报 - 年龄桶分类器
// ==========================================
// 边界: 首桶含 0，中间桶左开右闭，末桶无上限
// 顺序: 按上限升序判定，首个命中生效
// ==========================================
// 注意: 公畜没有 22-36 桶，22 个月以上统一归入 macho_36+
// ==========================================

use crate::domain::types::{AgeBucket, Sex};

/// 母畜分桶上限（None 表示无上限）
const FEMALE_TABLE: [(Option<f64>, AgeBucket); 5] = [
    (Some(7.0), AgeBucket::Female0To7),
    (Some(12.0), AgeBucket::Female7To12),
    (Some(18.0), AgeBucket::Female12To18),
    (Some(24.0), AgeBucket::Female18To24),
    (None, AgeBucket::Female24Plus),
];

/// 公畜分桶上限（None 表示无上限）
const MALE_TABLE: [(Option<f64>, AgeBucket); 5] = [
    (Some(7.0), AgeBucket::Male0To7),
    (Some(15.0), AgeBucket::Male7To15),
    (Some(18.0), AgeBucket::Male15To18),
    (Some(22.0), AgeBucket::Male18To22),
    (None, AgeBucket::Male36Plus),
];

/// (性别, 月龄) → 年龄桶
///
/// 性别或月龄无法判定、月龄为负数或非有限值时返回 None，调用方必须剔除
pub fn classify(sex: Sex, age_months: Option<f64>) -> Option<AgeBucket> {
    let age = age_months.filter(|a| a.is_finite() && *a >= 0.0)?;

    let table = match sex {
        Sex::Female => &FEMALE_TABLE,
        Sex::Male => &MALE_TABLE,
        Sex::Unresolved => return None,
    };

    table
        .iter()
        .find(|(upper, _)| upper.map_or(true, |u| age <= u))
        .map(|(_, bucket)| *bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_female_boundaries() {
        assert_eq!(classify(Sex::Female, Some(0.0)), Some(AgeBucket::Female0To7));
        assert_eq!(classify(Sex::Female, Some(7.0)), Some(AgeBucket::Female0To7));
        assert_eq!(classify(Sex::Female, Some(7.5)), Some(AgeBucket::Female7To12));
        assert_eq!(classify(Sex::Female, Some(12.0)), Some(AgeBucket::Female7To12));
        assert_eq!(classify(Sex::Female, Some(18.0)), Some(AgeBucket::Female12To18));
        assert_eq!(classify(Sex::Female, Some(24.0)), Some(AgeBucket::Female18To24));
        assert_eq!(classify(Sex::Female, Some(24.1)), Some(AgeBucket::Female24Plus));
        assert_eq!(classify(Sex::Female, Some(30.0)), Some(AgeBucket::Female24Plus));
    }

    #[test]
    fn test_male_boundaries() {
        assert_eq!(classify(Sex::Male, Some(0.0)), Some(AgeBucket::Male0To7));
        assert_eq!(classify(Sex::Male, Some(11.0)), Some(AgeBucket::Male7To15));
        assert_eq!(classify(Sex::Male, Some(15.0)), Some(AgeBucket::Male7To15));
        assert_eq!(classify(Sex::Male, Some(16.5)), Some(AgeBucket::Male15To18));
        assert_eq!(classify(Sex::Male, Some(22.0)), Some(AgeBucket::Male18To22));
    }

    #[test]
    fn test_male_over_22_falls_into_36_plus() {
        assert_eq!(classify(Sex::Male, Some(23.0)), Some(AgeBucket::Male36Plus));
        assert_eq!(classify(Sex::Male, Some(30.0)), Some(AgeBucket::Male36Plus));
        assert_eq!(classify(Sex::Male, Some(48.0)), Some(AgeBucket::Male36Plus));
    }

    #[test]
    fn test_unresolved_inputs() {
        assert_eq!(classify(Sex::Unresolved, Some(10.0)), None);
        assert_eq!(classify(Sex::Male, None), None);
        assert_eq!(classify(Sex::Female, Some(-1.0)), None);
        assert_eq!(classify(Sex::Female, Some(f64::NAN)), None);
    }

    proptest! {
        // 每个非负月龄恰好命中一个桶，且桶性别与输入一致
        #[test]
        fn prop_every_age_has_exactly_one_bucket(age in 0.0f64..600.0, male in any::<bool>()) {
            let sex = if male { Sex::Male } else { Sex::Female };
            let table = if male { &MALE_TABLE } else { &FEMALE_TABLE };

            let bucket = classify(sex, Some(age));
            prop_assert!(bucket.is_some());
            prop_assert_eq!(bucket.unwrap().sex(), sex);

            // 无重叠: 按区间定义独立计数，恰好一个区间包含该月龄
            let mut lower = 0.0f64;
            let mut hits = 0;
            for (i, (upper, _)) in table.iter().enumerate() {
                let above_lower = if i == 0 { age >= lower } else { age > lower };
                let below_upper = upper.map_or(true, |u| age <= u);
                if above_lower && below_upper {
                    hits += 1;
                }
                lower = upper.unwrap_or(f64::INFINITY);
            }
            prop_assert_eq!(hits, 1);
        }

        // 分桶单调: 月龄越大，列下标不减
        #[test]
        fn prop_buckets_are_monotonic(a in 0.0f64..100.0, b in 0.0f64..100.0, male in any::<bool>()) {
            let sex = if male { Sex::Male } else { Sex::Female };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let lo_bucket = classify(sex, Some(lo)).unwrap();
            let hi_bucket = classify(sex, Some(hi)).unwrap();
            prop_assert!(lo_bucket.index() <= hi_bucket.index());
        }
    }
}
