use crate::core::report::WriteReport;
use crate::core::storage::Storage;
use crate::domain::layout;
use crate::domain::model::{split_pem_chain, DomainCertificate, KeyPair, StoredItem};
use crate::utils::error::{Result, StorageError};
use crate::utils::validation::{validate_domain, validate_pem};

impl Storage {
    pub async fn has_account_key_pair(&self) -> Result<bool> {
        Ok(self.has(&layout::account_private_key()).await?
            && self.has(&layout::account_public_key()).await?)
    }

    pub async fn load_account_key_pair(&self) -> Result<KeyPair> {
        let private_key = self.load_text(&layout::account_private_key()).await?;
        let public_key = self.load_text(&layout::account_public_key()).await?;
        Ok(KeyPair {
            public_key,
            private_key,
        })
    }

    pub async fn store_account_key_pair(&self, key_pair: &KeyPair) -> Result<WriteReport> {
        let private_key = layout::account_private_key();
        let public_key = layout::account_public_key();
        validate_pem(&private_key, &key_pair.private_key)?;
        validate_pem(&public_key, &key_pair.public_key)?;

        tracing::info!("Storing account key pair");
        self.store_items(vec![
            StoredItem::new(private_key, key_pair.private_key.as_bytes()),
            StoredItem::new(public_key, key_pair.public_key.as_bytes()),
        ])
        .await
    }

    pub async fn has_domain_certificate(&self, domain: &str) -> Result<bool> {
        validate_domain(domain)?;
        Ok(self.has(&layout::domain_certificate(domain)).await?
            && self.has(&layout::domain_private_key(domain)).await?)
    }

    pub async fn load_domain_certificate(&self, domain: &str) -> Result<DomainCertificate> {
        validate_domain(domain)?;

        let certificate = self.load_text(&layout::domain_certificate(domain)).await?;
        let issuer_chain = match self.load_text(&layout::domain_chain(domain)).await {
            Ok(chain) => split_pem_chain(&chain),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        let private_key = self.load_text(&layout::domain_private_key(domain)).await?;
        let public_key = self.load_text(&layout::domain_public_key(domain)).await?;

        Ok(DomainCertificate {
            domain: domain.to_string(),
            certificate,
            issuer_chain,
            key_pair: KeyPair {
                public_key,
                private_key,
            },
        })
    }

    /// Writes certificate, chain, full chain and the domain key pair as one batch.
    pub async fn store_domain_certificate(
        &self,
        certificate: &DomainCertificate,
    ) -> Result<WriteReport> {
        let domain = certificate.domain.as_str();
        validate_domain(domain)?;

        let cert_key = layout::domain_certificate(domain);
        validate_pem(&cert_key, &certificate.certificate)?;
        for issuer in &certificate.issuer_chain {
            validate_pem(&layout::domain_chain(domain), issuer)?;
        }
        validate_pem(
            &layout::domain_private_key(domain),
            &certificate.key_pair.private_key,
        )?;
        validate_pem(
            &layout::domain_public_key(domain),
            &certificate.key_pair.public_key,
        )?;

        let mut items = vec![StoredItem::new(cert_key, certificate.certificate.as_bytes())];
        let chain = certificate.chain_pem();
        if !chain.is_empty() {
            items.push(StoredItem::new(layout::domain_chain(domain), chain));
        }
        items.push(StoredItem::new(
            layout::domain_fullchain(domain),
            certificate.fullchain_pem(),
        ));
        items.push(StoredItem::new(
            layout::domain_private_key(domain),
            certificate.key_pair.private_key.as_bytes(),
        ));
        items.push(StoredItem::new(
            layout::domain_public_key(domain),
            certificate.key_pair.public_key.as_bytes(),
        ));

        tracing::info!("Storing certificate for {}", domain);
        self.store_items(items).await
    }

    /// Domains with a certificate on the master, sorted.
    pub async fn list_domains(&self) -> Result<Vec<String>> {
        let mut domains: Vec<String> = self
            .master()
            .list(layout::CERTS_PREFIX)
            .await?
            .iter()
            .filter_map(|key| layout::certificate_domain(key))
            .map(str::to_string)
            .collect();
        domains.sort();
        domains.dedup();
        Ok(domains)
    }

    async fn load_text(&self, key: &str) -> Result<String> {
        let data = self.load(key).await?;
        String::from_utf8(data).map_err(|_| StorageError::InvalidMaterialError {
            key: key.to_string(),
            reason: "payload is not valid UTF-8".to_string(),
        })
    }
}
