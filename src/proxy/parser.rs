//! Proxy list parsing

use crate::error::ConfigError;
use crate::proxy::models::Proxy;
use crate::Result;
use std::io::BufRead;

/// Reads proxy identifiers, one per line
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line
    ///
    /// Surrounding whitespace is trimmed. Blank lines and lines starting
    /// with `#` yield `None`. Anything else is kept verbatim as the proxy
    /// identifier; whether it is a usable proxy is decided when it is probed.
    pub fn parse_line(line: &str) -> Option<Proxy> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        Some(Proxy::new(line))
    }

    /// Parse proxies from a reader such as locked stdin
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<Vec<Proxy>> {
        let mut proxies = Vec::new();
        for line in reader.lines() {
            if let Some(proxy) = Self::parse_line(&line?) {
                proxies.push(proxy);
            }
        }
        Ok(proxies)
    }

    /// Refuse lists that are empty or longer than `max`.
    pub fn check_limit(proxies: &[Proxy], max: usize) -> std::result::Result<(), ConfigError> {
        if proxies.is_empty() {
            return Err(ConfigError::NoProxies);
        }
        if proxies.len() > max {
            return Err(ConfigError::TooManyProxies {
                count: proxies.len(),
                max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_trims_whitespace() {
        let proxy = ProxyParser::parse_line("  192.168.1.1:8080 \r").unwrap();
        assert_eq!(proxy.as_str(), "192.168.1.1:8080");
    }

    #[test]
    fn test_parse_keeps_scheme() {
        let proxy = ProxyParser::parse_line("socks5://192.168.1.1:1080").unwrap();
        assert_eq!(proxy.as_str(), "socks5://192.168.1.1:1080");
    }

    #[test]
    fn test_parse_empty_line() {
        assert!(ProxyParser::parse_line("").is_none());
        assert!(ProxyParser::parse_line("   ").is_none());
    }

    #[test]
    fn test_parse_comment_line() {
        assert!(ProxyParser::parse_line("# This is a comment").is_none());
    }

    #[test]
    fn test_parse_reader_skips_comments() {
        let content = r#"
192.168.1.1:8080
192.168.1.2:8080
# This is a comment
http://192.168.1.3:8080
"#;
        let proxies = ProxyParser::parse_reader(Cursor::new(content)).unwrap();
        assert_eq!(proxies.len(), 3);
        assert_eq!(proxies[2].as_str(), "http://192.168.1.3:8080");
    }

    #[test]
    fn test_parse_reader_keeps_order() {
        let input = Cursor::new("b:1\n\na:2\nc:3\n");
        let proxies = ProxyParser::parse_reader(input).unwrap();
        let ids: Vec<_> = proxies.iter().map(Proxy::as_str).collect();
        assert_eq!(ids, vec!["b:1", "a:2", "c:3"]);
    }

    #[test]
    fn test_check_limit() {
        let proxies = ProxyParser::parse_reader(Cursor::new("a:1\nb:2\nc:3")).unwrap();
        assert!(ProxyParser::check_limit(&proxies, 3).is_ok());
        assert_eq!(
            ProxyParser::check_limit(&proxies, 2),
            Err(ConfigError::TooManyProxies { count: 3, max: 2 })
        );
        assert_eq!(
            ProxyParser::check_limit(&[], 20),
            Err(ConfigError::NoProxies)
        );
    }
}
