// Submission of responses to a third-party form endpoint.

use reqwest::blocking::Client;
use std::collections::BTreeMap;

use crate::survey::*;

/// Renames the fields of a response to the identifiers of the endpoint.
///
/// Selections contribute one pair per selected option, all under the same
/// identifier. Fields without an identifier are not sent.
pub fn form_pairs(
    field_map: &BTreeMap<String, String>,
    record: &SurveyResponse,
) -> Vec<(String, String)> {
    record
        .to_pairs()
        .into_iter()
        .filter_map(|(name, value)| match field_map.get(&name) {
            Some(entry) => Some((entry.clone(), value)),
            None => {
                debug!("form_pairs: skipping unmapped field {:?}", name);
                None
            }
        })
        .collect()
}

/// Posts one response. Only a 2xx status counts as stored; there is no retry.
pub fn submit_form(
    client: &Client,
    url: &str,
    field_map: &BTreeMap<String, String>,
    record: &SurveyResponse,
) -> CollectorResult<()> {
    let pairs = form_pairs(field_map, record);
    info!("submit_form: posting {} fields to {}", pairs.len(), url);
    let response = client
        .post(url)
        .form(&pairs)
        .send()
        .context(RemoteTransportSnafu { url })?;
    let status = response.status();
    debug!("submit_form: {} answered {}", url, status);
    ensure!(
        status.is_success(),
        RemoteRejectedSnafu {
            url,
            status: status.as_u16(),
        }
    );
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    /// Serves a single request with the given status and hands back the
    /// request body.
    pub fn serve_once(status: u16) -> (String, JoinHandle<String>) {
        let (url, listener) = bind();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            answer(stream, status)
        });
        (url, handle)
    }

    /// Serves one request per status, in order, on separate connections.
    pub fn serve_sequence(statuses: &[u16]) -> (String, JoinHandle<Vec<String>>) {
        let (url, listener) = bind();
        let statuses = statuses.to_vec();
        let handle = thread::spawn(move || {
            statuses
                .into_iter()
                .map(|status| {
                    let (stream, _) = listener.accept().unwrap();
                    answer(stream, status)
                })
                .collect()
        });
        (url, handle)
    }

    fn bind() -> (String, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/formResponse", listener.local_addr().unwrap());
        (url, listener)
    }

    fn answer(mut stream: TcpStream, status: u16) -> String {
        let mut buf: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 1024];
        let body_start = loop {
            let n = stream.read(&mut chunk).unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
            if n == 0 {
                break buf.len();
            }
        };
        let head = String::from_utf8_lossy(&buf[..body_start]).to_lowercase();
        let len: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().unwrap())
            .unwrap_or(0);
        while buf.len() < body_start + len {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let reply = format!(
            "HTTP/1.1 {} Test\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status
        );
        stream.write_all(reply.as_bytes()).unwrap();
        String::from_utf8_lossy(&buf[body_start..]).to_string()
    }

    /// An address nobody listens on.
    pub fn closed_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/formResponse", addr)
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::*;
    use super::*;
    use survey_collector::collect;

    fn record() -> SurveyResponse {
        let q = Questionnaire::new(
            "English",
            vec![
                Question::single("country", &["Norway", "Spain"]),
                Question::single("gender", &["Male", "Female"]),
                Question::multi("purchase_factors", &["Price", "Taste", "Nutrition"]),
                Question::text("improvement", DEFAULT_MAX_CHARS),
            ],
        );
        let mut b = AnswerBuilder::new(&q);
        b.select("country", "Norway").unwrap();
        b.check("purchase_factors", "Nutrition").unwrap();
        b.check("purchase_factors", "Price").unwrap();
        b.text("improvement", "More salmon").unwrap();
        collect(&b.build(), &q).unwrap()
    }

    fn field_map() -> BTreeMap<String, String> {
        [
            ("country", "entry.100"),
            ("gender", "entry.200"),
            ("purchase_factors", "entry.300"),
            ("improvement", "entry.400"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn pairs_are_renamed_and_repeated() {
        let pairs = form_pairs(&field_map(), &record());
        let expected: Vec<(String, String)> = [
            ("entry.100", "Norway"),
            ("entry.300", "Price"),
            ("entry.300", "Nutrition"),
            ("entry.400", "More salmon"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn status_200_is_success() {
        let (url, handle) = serve_once(200);
        submit_form(&client(), &url, &field_map(), &record()).unwrap();
        let body = handle.join().unwrap();
        assert_eq!(
            body,
            "entry.100=Norway&entry.300=Price&entry.300=Nutrition&entry.400=More+salmon"
        );
    }

    #[test]
    fn other_statuses_are_failures() {
        for status in [400u16, 500] {
            let (url, handle) = serve_once(status);
            let res = submit_form(&client(), &url, &field_map(), &record());
            handle.join().unwrap();
            match res {
                Err(e @ CollectorError::RemoteRejected { .. }) => assert!(e.is_recoverable()),
                x => panic!("unexpected outcome for {}: {:?}", status, x),
            }
        }
    }

    #[test]
    fn connection_failure_is_recoverable() {
        let res = submit_form(&client(), &closed_url(), &field_map(), &record());
        match res {
            Err(e @ CollectorError::RemoteTransport { .. }) => assert!(e.is_recoverable()),
            x => panic!("unexpected outcome: {:?}", x),
        }
    }
}
