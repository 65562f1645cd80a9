use super::*;

const BASIC_OFFER: &str = "\
v=0
o=- 1 1 IN IP4 127.0.0.1
s=-
t=0 0
a=fingerprint:sha-256 AB:CD:EF:01:23:45
a=setup:actpass
m=audio 9 UDP/TLS/RTP/SAVPF 111 0
c=IN IP4 0.0.0.0
a=rtpmap:111 opus/48000/2
a=fmtp:111 minptime=10;useinbandfec=1
a=rtpmap:0 PCMU/8000
a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level
";

#[test]
fn extracts_opus_parameters_and_dtls_from_a_basic_offer() {
    let extracted = extract_session(BASIC_OFFER).expect("valid audio section");
    assert_eq!(extracted.rtp_parameters.payload_type, 111);
    assert_eq!(extracted.rtp_parameters.clock_rate, 48000);
    assert_eq!(extracted.rtp_parameters.channels, 2);
    assert!(extracted.rtp_parameters.use_inband_fec);
    assert!(extracted.rtp_parameters.encodings.is_empty());

    assert!(extracted.rtp_capabilities.codecs.iter().any(|c| c.eq_ignore_ascii_case("opus")));
    assert!(extracted
        .rtp_capabilities
        .header_extensions
        .iter()
        .any(|e| e.contains("ssrc-audio-level")));

    assert_eq!(extracted.dtls_parameters.role, "actpass");
    assert_eq!(extracted.dtls_parameters.fingerprint_algorithm, "sha-256");
    assert_eq!(extracted.dtls_parameters.fingerprint_value, "AB:CD:EF:01:23:45");
}

#[test]
fn simulcast_attribute_yields_three_encodings() {
    let sdp = format!("{BASIC_OFFER}a=simulcast:send l;m;h\n");
    let extracted = extract_session(&sdp).unwrap();
    assert_eq!(extracted.rtp_parameters.encodings.len(), 3);
}

#[test]
fn missing_audio_section_returns_none() {
    let sdp = "v=0\no=- 1 1 IN IP4 127.0.0.1\ns=-\nt=0 0\nm=video 9 UDP/TLS/RTP/SAVPF 96\n";
    assert!(extract_session(sdp).is_none());
}

#[test]
fn non_opus_only_codec_returns_none() {
    let sdp = "\
v=0
o=- 1 1 IN IP4 127.0.0.1
s=-
t=0 0
m=audio 9 UDP/TLS/RTP/SAVPF 0
a=rtpmap:0 PCMU/8000
a=fingerprint:sha-256 AB:CD
a=setup:active
";
    assert!(extract_session(sdp).is_none());
}

#[test]
fn fmtp_without_useinbandfec_defaults_to_false() {
    let sdp = "\
v=0
o=- 1 1 IN IP4 127.0.0.1
s=-
t=0 0
a=fingerprint:sha-256 AB:CD
m=audio 9 UDP/TLS/RTP/SAVPF 111
a=rtpmap:111 opus/48000/2
a=setup:active
";
    let extracted = extract_session(sdp).unwrap();
    assert!(!extracted.rtp_parameters.use_inband_fec);
}

#[test]
fn picks_first_opus_payload_type_when_multiple_audio_codecs_offered() {
    let sdp = "\
v=0
o=- 1 1 IN IP4 127.0.0.1
s=-
t=0 0
a=fingerprint:sha-256 AB:CD
a=setup:active
m=audio 9 UDP/TLS/RTP/SAVPF 0 111
a=rtpmap:0 PCMU/8000
a=rtpmap:111 opus/48000/2
";
    let extracted = extract_session(sdp).unwrap();
    assert_eq!(extracted.rtp_parameters.payload_type, 111);
}
