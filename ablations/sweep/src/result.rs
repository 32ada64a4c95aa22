//! 实验结果.

use crate::profile::Profile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.3}"),
            None => "/".to_string(),
        }
    }

    #[inline]
    fn u64_to_display(u: Option<u64>) -> String {
        match u {
            Some(u) => u.to_string(),
            None => "/".to_string(),
        }
    }

    let (plain, repair) = p.get_thresholds();
    writeln!(w, "Profile `{name}`:")?;
    writeln!(w, "{S4}Cases: {}", p.get_cases())?;
    writeln!(w, "{S4}Succeeded: [{}]", p.get_succeeded().join(", "))?;
    writeln!(w, "{S4}Failed: [{}]", p.get_failed().join(", "))?;
    writeln!(w, "{S4}Solver calls: {}", p.get_solver_calls())?;
    writeln!(
        w,
        "{S4}Average solver calls: {} per case",
        f64_to_display(p.get_avg_solver_calls())
    )?;
    writeln!(w, "{S4}Thresholds tried: {plain} plain, {repair} repair")?;
    writeln!(
        w,
        "{S4}Registration total time: {} us",
        p.get_registration_time_us()
    )?;
    writeln!(
        w,
        "{S4}Registration average time: {} us",
        f64_to_display(p.get_avg_registration_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    let t = p.get_most_time_consuming().map(|d| d.as_micros() as u64);
    write!(w, "{S4}Most time-consuming case costs {} us", u64_to_display(t))?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for (key, profile) in self.data.iter() {
            describe_into(key, profile, &mut buf).unwrap();
            println!("{}", String::from_utf8_lossy(&buf));
            buf.clear();

            utils::sep();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::describe_into;
    use crate::profile::Profile;

    #[test]
    fn test_describe_empty_profile() {
        let mut buf = Vec::new();
        describe_into("empty", &Profile::new().finish(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Profile `empty`:"));
        assert!(text.contains("Average solver calls: / per case"));
        assert!(text.ends_with("costs / us"));
    }
}
